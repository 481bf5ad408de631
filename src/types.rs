use std::time::Duration;

use crate::registry::AnswerRegistry;

/// A trivia question ready for broadcast: choices are pre-shuffled and
/// `correct_index` points at the correct choice's position after shuffling.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub category: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    /// The 1-based choice number chatters whisper to answer correctly.
    pub fn correct_choice(&self) -> usize {
        self.correct_index + 1
    }

    pub fn correct_text(&self) -> &str {
        &self.choices[self.correct_index]
    }
}

/// One chatter's answer for the current round. Immutable after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub participant: String,
    /// 1-based choice number as whispered.
    pub choice: usize,
    /// 1-based position in the round's arrival sequence.
    pub arrival_order: usize,
    /// Time from round start to this submission.
    pub latency: Duration,
}

/// Round lifecycle. Exactly one value exists process-wide, so no two
/// rounds can ever be active at the same time.
#[derive(Debug)]
pub enum RoundState {
    Idle,
    Active {
        question: Question,
        registry: AnswerRegistry,
    },
    /// Transient state while the outcome is computed and announced.
    Resolving,
}

impl RoundState {
    pub fn is_idle(&self) -> bool {
        matches!(self, RoundState::Idle)
    }
}

/// An inbound chat event, decoded once at the gateway edge.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Broadcast { sender: String, text: String },
    Whisper { sender: String, text: String },
}

/// An outbound chat message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Broadcast { text: String },
    Whisper { to: String, text: String },
}
