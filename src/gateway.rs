//! Chat transport
//!
//! A thin websocket client around the chat protocol. The write half is
//! owned by the round controller through the [`ChatGateway`] trait; the
//! read half feeds decoded [`ChatEvent`]s into the event loop.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::protocol;
use crate::types::{ChatEvent, Outbound};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors from the chat transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("chat token is not a valid cookie value")]
    BadCredential,
}

/// Outbound side of the chat connection. A send failure is fatal to that
/// one message only; the caller decides what (if anything) to do about it.
#[async_trait]
pub trait ChatGateway: Send {
    async fn send(&mut self, outbound: &Outbound) -> Result<(), TransportError>;
}

/// Write half of the live websocket connection
pub struct WsGateway {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl ChatGateway for WsGateway {
    async fn send(&mut self, outbound: &Outbound) -> Result<(), TransportError> {
        let frame = protocol::encode_outbound(outbound);
        tracing::debug!(%frame, "Sending chat frame");
        self.sink.send(Message::Text(frame)).await?;
        Ok(())
    }
}

/// Read half of the live websocket connection
pub struct WsReader {
    stream: SplitStream<WsStream>,
}

impl WsReader {
    /// Next decoded chat event. Frames that are not text, not a known
    /// kind, or fail to decode are skipped. Returns `None` once the
    /// connection is closed or errors out.
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(frame)) => {
                    if let Some(event) = protocol::decode_frame(&frame) {
                        return Some(event);
                    }
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Failed to read from chat connection: {e}");
                    return None;
                }
            }
        }
    }
}

/// Connect and authenticate to the chat endpoint, returning the two
/// halves of the connection.
pub async fn connect(url: &str, jwt: &str) -> Result<(WsGateway, WsReader), TransportError> {
    let mut request = url.into_client_request()?;
    let cookie = HeaderValue::from_str(&format!("jwt={jwt}"))
        .map_err(|_| TransportError::BadCredential)?;
    request.headers_mut().insert("Cookie", cookie);

    let (ws, _response) = connect_async(request).await?;
    let (sink, stream) = ws.split();

    Ok((WsGateway { sink }, WsReader { stream }))
}
