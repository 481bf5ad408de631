//! Round-scoped answer collection
//!
//! Owned exclusively by the active round and mutated only by the single
//! event-loop consumer. Enforces one submission per participant and keeps
//! the arrival-ordered sequence used for winner selection.

use std::collections::HashSet;
use std::time::Instant;

use crate::types::Submission;

/// Why a whispered answer was not recorded
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("answer text is not a choice number")]
    Unparseable,

    #[error("participant has already answered this round")]
    AlreadyAnswered,
}

/// Collected submissions for one round. Created when the round goes
/// active, dropped wholesale when it resolves.
#[derive(Debug)]
pub struct AnswerRegistry {
    started_at: Instant,
    submissions: Vec<Submission>,
    answered: HashSet<String>,
}

impl AnswerRegistry {
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            submissions: Vec::new(),
            answered: HashSet::new(),
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Record a whispered answer. The raw text must parse as a 1-based
    /// choice number; a participant gets exactly one recorded submission
    /// per round. Unparseable text records nothing, so the participant
    /// may retry.
    pub fn submit(
        &mut self,
        participant: &str,
        raw_text: &str,
        now: Instant,
    ) -> Result<&Submission, SubmitError> {
        let choice: usize = raw_text
            .trim()
            .parse()
            .map_err(|_| SubmitError::Unparseable)?;

        if self.answered.contains(participant) {
            return Err(SubmitError::AlreadyAnswered);
        }

        self.answered.insert(participant.to_string());
        let index = self.submissions.len();
        self.submissions.push(Submission {
            participant: participant.to_string(),
            choice,
            arrival_order: index + 1,
            latency: now.saturating_duration_since(self.started_at),
        });

        Ok(&self.submissions[index])
    }

    /// The first submission in arrival order matching the correct 1-based
    /// choice. Arrival order is the sole tie-break: earliest correct
    /// answer wins, regardless of latency.
    pub fn winner(&self, correct_choice: usize) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.choice == correct_choice)
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }
}
