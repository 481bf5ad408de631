//! Chat wire codec
//!
//! Frames on the wire are a kind token followed by a JSON payload, e.g.
//! `MSG {"nick": "alice", "data": "hello"}`. Decoding happens exactly once
//! here at the edge; the rest of the bot only sees [`ChatEvent`] values.

use serde::Deserialize;

use crate::types::{ChatEvent, Outbound};

/// Public chat message frame kind
const KIND_BROADCAST: &str = "MSG";
/// Whisper frame kind
const KIND_WHISPER: &str = "PRIVMSG";

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    nick: String,
    data: String,
}

/// Decode a raw text frame into a chat event. Frames of any other kind
/// (join/quit notices, pings, ...) and malformed payloads yield `None`
/// and are skipped by the reader.
pub fn decode_frame(frame: &str) -> Option<ChatEvent> {
    let (kind, payload) = frame.split_once(' ')?;
    let payload: Payload = serde_json::from_str(payload).ok()?;

    match kind {
        KIND_BROADCAST => Some(ChatEvent::Broadcast {
            sender: payload.nick,
            text: payload.data,
        }),
        KIND_WHISPER => Some(ChatEvent::Whisper {
            sender: payload.nick,
            text: payload.data,
        }),
        _ => None,
    }
}

/// Encode an outbound message as a wire frame. The payload is built with
/// serde so message text can never break the frame's own quoting.
pub fn encode_outbound(outbound: &Outbound) -> String {
    match outbound {
        Outbound::Broadcast { text } => {
            format!("{} {}", KIND_BROADCAST, serde_json::json!({ "data": text }))
        }
        Outbound::Whisper { to, text } => format!(
            "{} {}",
            KIND_WHISPER,
            serde_json::json!({ "data": text, "nick": to })
        ),
    }
}
