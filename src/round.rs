//! Round lifecycle state machine
//!
//! Owns the `Idle → Active → Resolving → Idle` cycle for trivia rounds.
//! All transitions are driven by a single event-loop consumer; the
//! per-round timer task only signals that the answer window has elapsed
//! and never touches round state itself.

use std::time::{Duration, Instant};

use rand::seq::IndexedRandom;
use rand::Rng;
use tokio::sync::mpsc;

use crate::config::BotConfig;
use crate::gateway::ChatGateway;
use crate::provider::QuestionProvider;
use crate::registry::{AnswerRegistry, SubmitError};
use crate::types::{ChatEvent, Outbound, Question, RoundState, Submission};

const EMOTES: &[&str] = &["POGGERS", "SOY", "PepoGood", "PepoG", "PepoHmm"];

const REPLY_ALREADY_ANSWERED: &str = "You have already answered! MiyanoBird";
const REPLY_UNPARSEABLE: &str = "I could not determine your answer FeelsPepoMan";

/// Everything the event loop reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Chat(ChatEvent),
    /// The active round's answer window has elapsed
    Deadline,
}

/// Round parameters extracted from the bot config
#[derive(Debug, Clone)]
pub struct RoundConfig {
    pub start_command: String,
    pub window: Duration,
}

impl From<&BotConfig> for RoundConfig {
    fn from(config: &BotConfig) -> Self {
        Self {
            start_command: config.start_command.clone(),
            window: config.round_window(),
        }
    }
}

fn random_emote<R: Rng>(rng: &mut R) -> &'static str {
    EMOTES.choose(rng).copied().unwrap_or(EMOTES[0])
}

fn enumerate_choices(choices: &[String]) -> String {
    let mut out = String::new();
    for (i, choice) in choices.iter().enumerate() {
        out.push_str(&format!("`{}` {} ", i + 1, choice));
    }
    out.trim_end().to_string()
}

fn format_latency(latency: Duration) -> String {
    format!("{:.2}s", latency.as_secs_f64())
}

/// The broadcast that opens a round
fn announce_prompt<R: Rng>(question: &Question, window: Duration, rng: &mut R) -> String {
    format!(
        "{} Trivia time answer is in {}s, whisper me the number! ({}) Question: `{}`... Possible answers: {}",
        random_emote(rng),
        window.as_secs(),
        question.category,
        question.prompt,
        enumerate_choices(&question.choices),
    )
}

/// The broadcast that closes a round
fn announce_result(question: &Question, winner: Option<&Submission>) -> String {
    let lead = format!(
        "The correct answer is: {} {}.",
        question.correct_choice(),
        question.correct_text()
    );

    match winner {
        Some(sub) => format!(
            "{} {} won this round. They answered in {}",
            lead,
            sub.participant,
            format_latency(sub.latency)
        ),
        None => format!("{} No one answered correctly PepeLaugh", lead),
    }
}

/// The trivia round state machine. One instance exists per process and
/// exclusively owns the current question and answer registry.
pub struct RoundController {
    state: RoundState,
    gateway: Box<dyn ChatGateway>,
    provider: Box<dyn QuestionProvider>,
    config: RoundConfig,
    deadline_tx: mpsc::Sender<Event>,
}

impl RoundController {
    pub fn new(
        gateway: Box<dyn ChatGateway>,
        provider: Box<dyn QuestionProvider>,
        config: RoundConfig,
        deadline_tx: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            state: RoundState::Idle,
            gateway,
            provider,
            config,
            deadline_tx,
        }
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    /// Dispatch one event. `now` is captured by the caller when the event
    /// is pulled off the loop, which keeps all round timing on a single
    /// clock reading per event.
    pub async fn handle(&mut self, event: Event, now: Instant) {
        match event {
            Event::Chat(ChatEvent::Broadcast { text, .. }) => {
                if text.starts_with(&self.config.start_command) {
                    self.start_round(now).await;
                }
            }
            Event::Chat(ChatEvent::Whisper { sender, text }) => {
                self.accept_answer(sender, &text, now).await;
            }
            Event::Deadline => self.resolve().await,
        }
    }

    async fn start_round(&mut self, now: Instant) {
        if !self.state.is_idle() {
            tracing::debug!("Ignoring start command, a round is already running");
            return;
        }

        tracing::info!("Starting trivia round, requesting question");
        let question = match self.provider.fetch_question().await {
            Ok(question) => question,
            Err(e) => {
                tracing::error!("Question fetch failed, round not started: {e}");
                return;
            }
        };

        let prompt = announce_prompt(&question, self.config.window, &mut rand::rng());
        self.send(Outbound::Broadcast { text: prompt }).await;

        self.state = RoundState::Active {
            question,
            registry: AnswerRegistry::new(now),
        };

        // Only one timer can ever be armed: the idle guard above refuses
        // a new round while this one is outstanding.
        let tx = self.deadline_tx.clone();
        let window = self.config.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = tx.send(Event::Deadline).await;
        });
    }

    async fn accept_answer(&mut self, sender: String, text: &str, now: Instant) {
        let reply = match &mut self.state {
            RoundState::Active { registry, .. } => match registry.submit(&sender, text, now) {
                Ok(sub) => {
                    tracing::debug!(
                        participant = %sender,
                        choice = sub.choice,
                        order = sub.arrival_order,
                        "Answer recorded"
                    );
                    None
                }
                Err(SubmitError::AlreadyAnswered) => Some(REPLY_ALREADY_ANSWERED),
                Err(SubmitError::Unparseable) => Some(REPLY_UNPARSEABLE),
            },
            _ => {
                tracing::debug!(participant = %sender, "Ignoring whisper outside a round");
                None
            }
        };

        if let Some(text) = reply {
            self.send(Outbound::Whisper {
                to: sender,
                text: text.to_string(),
            })
            .await;
        }
    }

    async fn resolve(&mut self) {
        match std::mem::replace(&mut self.state, RoundState::Resolving) {
            RoundState::Active { question, registry } => {
                tracing::info!(submissions = registry.len(), "Round window closed, determining winner");

                let winner = registry.winner(question.correct_choice());
                let text = announce_result(&question, winner);
                self.send(Outbound::Broadcast { text }).await;

                // Question and registry are dropped here
                self.state = RoundState::Idle;
            }
            other => {
                // Stray deadline signal, nothing to resolve
                self.state = other;
            }
        }
    }

    /// A send failure is fatal to that one message only: it is logged and
    /// the round state already committed stays committed.
    async fn send(&mut self, outbound: Outbound) {
        if let Err(e) = self.gateway.send(&outbound).await {
            tracing::warn!("Failed to deliver chat message: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TransportError;
    use crate::provider::{ProviderError, ProviderResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct RecordingGateway {
        sent: Arc<Mutex<Vec<Outbound>>>,
    }

    #[async_trait]
    impl ChatGateway for RecordingGateway {
        async fn send(&mut self, outbound: &Outbound) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(outbound.clone());
            Ok(())
        }
    }

    struct FailingGateway;

    #[async_trait]
    impl ChatGateway for FailingGateway {
        async fn send(&mut self, _outbound: &Outbound) -> Result<(), TransportError> {
            Err(TransportError::BadCredential)
        }
    }

    struct StubProvider {
        question: Question,
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl QuestionProvider for StubProvider {
        async fn fetch_question(&self) -> ProviderResult<Question> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.question.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl QuestionProvider for FailingProvider {
        async fn fetch_question(&self) -> ProviderResult<Question> {
            Err(ProviderError::EmptyBatch)
        }
    }

    fn capitals_question() -> Question {
        Question {
            category: "Geography".to_string(),
            prompt: "What is the capital of France?".to_string(),
            choices: vec!["Paris".to_string(), "Lyon".to_string(), "Nice".to_string()],
            correct_index: 0,
        }
    }

    struct Harness {
        controller: RoundController,
        sent: Arc<Mutex<Vec<Outbound>>>,
        fetches: Arc<AtomicUsize>,
        deadline_rx: mpsc::Receiver<Event>,
        start: Instant,
    }

    fn harness_with_window(window: Duration) -> Harness {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let fetches = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel(8);

        let controller = RoundController::new(
            Box::new(RecordingGateway { sent: sent.clone() }),
            Box::new(StubProvider {
                question: capitals_question(),
                fetches: fetches.clone(),
            }),
            RoundConfig {
                start_command: "!trivia".to_string(),
                window,
            },
            tx,
        );

        Harness {
            controller,
            sent,
            fetches,
            deadline_rx: rx,
            start: Instant::now(),
        }
    }

    fn harness() -> Harness {
        harness_with_window(Duration::from_secs(20))
    }

    fn start_event() -> Event {
        Event::Chat(ChatEvent::Broadcast {
            sender: "host".to_string(),
            text: "!trivia".to_string(),
        })
    }

    fn whisper(sender: &str, text: &str) -> Event {
        Event::Chat(ChatEvent::Whisper {
            sender: sender.to_string(),
            text: text.to_string(),
        })
    }

    #[tokio::test]
    async fn test_start_command_fetches_and_broadcasts_prompt() {
        let mut h = harness();

        h.controller.handle(start_event(), h.start).await;

        assert!(matches!(h.controller.state(), RoundState::Active { .. }));
        assert_eq!(h.fetches.load(Ordering::SeqCst), 1);

        let sent = h.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Outbound::Broadcast { text } => {
                assert!(text.contains("whisper me the number"));
                assert!(text.contains("(Geography)"));
                assert!(text.contains("`1` Paris"));
                assert!(text.contains("`2` Lyon"));
                assert!(text.contains("`3` Nice"));
            }
            other => panic!("expected broadcast, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_start_while_active_is_a_silent_no_op() {
        let mut h = harness();

        h.controller.handle(start_event(), h.start).await;
        h.controller.handle(whisper("alice", "2"), h.start).await;

        h.controller.handle(start_event(), h.start).await;

        // No second fetch, no second prompt, registry untouched
        assert_eq!(h.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(h.sent.lock().unwrap().len(), 1);
        match h.controller.state() {
            RoundState::Active { registry, .. } => assert_eq!(registry.len(), 1),
            other => panic!("expected active round, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_state_idle() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (tx, _rx) = mpsc::channel(8);
        let mut controller = RoundController::new(
            Box::new(RecordingGateway { sent: sent.clone() }),
            Box::new(FailingProvider),
            RoundConfig {
                start_command: "!trivia".to_string(),
                window: Duration::from_secs(20),
            },
            tx,
        );

        controller.handle(start_event(), Instant::now()).await;

        assert!(controller.state().is_idle());
        assert!(sent.lock().unwrap().is_empty());

        // The next start command gets a fresh attempt
        controller.handle(start_event(), Instant::now()).await;
        assert!(controller.state().is_idle());
    }

    #[tokio::test]
    async fn test_unparseable_answer_gets_notice_and_can_retry() {
        let mut h = harness();
        h.controller.handle(start_event(), h.start).await;

        h.controller.handle(whisper("alice", "two"), h.start).await;

        {
            let sent = h.sent.lock().unwrap();
            assert_eq!(
                sent[1],
                Outbound::Whisper {
                    to: "alice".to_string(),
                    text: REPLY_UNPARSEABLE.to_string(),
                }
            );
        }

        h.controller.handle(whisper("alice", "1"), h.start).await;
        match h.controller.state() {
            RoundState::Active { registry, .. } => assert_eq!(registry.len(), 1),
            other => panic!("expected active round, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_answer_gets_notice() {
        let mut h = harness();
        h.controller.handle(start_event(), h.start).await;

        h.controller.handle(whisper("alice", "1"), h.start).await;
        h.controller.handle(whisper("alice", "2"), h.start).await;

        let sent = h.sent.lock().unwrap();
        assert_eq!(
            sent[1],
            Outbound::Whisper {
                to: "alice".to_string(),
                text: REPLY_ALREADY_ANSWERED.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_whisper_outside_round_is_ignored() {
        let mut h = harness();

        h.controller.handle(whisper("alice", "1"), h.start).await;

        assert!(h.controller.state().is_idle());
        assert!(h.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deadline_announces_winner_and_rearms() {
        let mut h = harness();
        h.controller.handle(start_event(), h.start).await;

        h.controller
            .handle(whisper("alice", "2"), h.start + Duration::from_secs(2))
            .await;
        h.controller
            .handle(whisper("bob", "1"), h.start + Duration::from_secs(5))
            .await;

        h.controller.handle(Event::Deadline, h.start).await;

        assert!(h.controller.state().is_idle());
        let sent = h.sent.lock().unwrap();
        match sent.last().unwrap() {
            Outbound::Broadcast { text } => {
                assert!(text.contains("The correct answer is: 1 Paris."));
                assert!(text.contains("bob won this round"));
                assert!(text.contains("5.00s"));
            }
            other => panic!("expected broadcast, got {other:?}"),
        }
        drop(sent);

        // The controller is re-armed for the next round
        h.controller.handle(start_event(), h.start).await;
        assert_eq!(h.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_deadline_with_no_correct_answer() {
        let mut h = harness();
        h.controller.handle(start_event(), h.start).await;
        h.controller.handle(whisper("alice", "3"), h.start).await;

        h.controller.handle(Event::Deadline, h.start).await;

        let sent = h.sent.lock().unwrap();
        match sent.last().unwrap() {
            Outbound::Broadcast { text } => {
                assert!(text.contains("No one answered correctly"));
            }
            other => panic!("expected broadcast, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stray_deadline_while_idle_is_ignored() {
        let mut h = harness();
        h.controller.handle(Event::Deadline, h.start).await;
        assert!(h.controller.state().is_idle());
        assert!(h.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timer_task_signals_deadline_after_window() {
        let mut h = harness_with_window(Duration::from_millis(10));
        h.controller.handle(start_event(), h.start).await;

        let event = h.deadline_rx.recv().await.unwrap();
        assert_eq!(event, Event::Deadline);
    }

    #[tokio::test]
    async fn test_send_failure_does_not_block_resolution() {
        let (tx, _rx) = mpsc::channel(8);
        let mut controller = RoundController::new(
            Box::new(FailingGateway),
            Box::new(StubProvider {
                question: capitals_question(),
                fetches: Arc::new(AtomicUsize::new(0)),
            }),
            RoundConfig {
                start_command: "!trivia".to_string(),
                window: Duration::from_secs(20),
            },
            tx,
        );

        let start = Instant::now();
        controller.handle(start_event(), start).await;
        assert!(matches!(controller.state(), RoundState::Active { .. }));

        controller.handle(Event::Deadline, start).await;
        assert!(controller.state().is_idle());
    }

    #[test]
    fn test_announce_result_normalizes_latency_formatting() {
        let question = capitals_question();
        let winner = Submission {
            participant: "alice".to_string(),
            choice: 1,
            arrival_order: 1,
            latency: Duration::from_millis(2500),
        };

        let text = announce_result(&question, Some(&winner));
        assert_eq!(
            text,
            "The correct answer is: 1 Paris. alice won this round. They answered in 2.50s"
        );
    }

    #[test]
    fn test_enumerate_choices_is_one_based() {
        let choices = vec!["a".to_string(), "b".to_string()];
        assert_eq!(enumerate_choices(&choices), "`1` a `2` b");
    }
}
