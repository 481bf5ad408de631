//! Trivia question provider
//!
//! Fetches question batches from an OpenTDB-style HTTP API, drops
//! stale-looking candidates, picks one at random, and assembles a
//! broadcast-ready [`Question`] with shuffled choices.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;

use crate::config::BotConfig;
use crate::types::Question;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur while fetching a question
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("trivia API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("trivia API returned response code {0}")]
    Api(u8),

    #[error("no usable questions in the fetched batch")]
    EmptyBatch,

    #[error("invalid stale-question pattern: {0}")]
    BadPattern(#[from] regex::Error),
}

/// Trait for anything that can supply one question per round
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    async fn fetch_question(&self) -> ProviderResult<Question>;
}

/// One raw question record as returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestion {
    pub category: String,
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    response_code: u8,
    results: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Drops candidates that look stale or miscategorized. The provider is
/// known to serve some questions whose text dates them (e.g. a 19xx year)
/// under a category where that ages badly; the exact predicate is
/// configuration, not business logic.
#[derive(Debug)]
pub struct StaleFilter {
    pattern: Regex,
    category: String,
}

impl StaleFilter {
    pub fn new(pattern: &str, category: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            category: category.to_string(),
        })
    }

    pub fn is_stale(&self, raw: &RawQuestion) -> bool {
        raw.category == self.category && self.pattern.is_match(&raw.question)
    }

    pub fn apply(&self, batch: Vec<RawQuestion>) -> Vec<RawQuestion> {
        batch.into_iter().filter(|q| !self.is_stale(q)).collect()
    }
}

/// Unescape HTML entities and normalize quote characters so the text can
/// never break the outbound frame's own quoting.
fn clean_text(raw: &str) -> String {
    html_escape::decode_html_entities(raw).replace('"', "'")
}

/// Combine the correct answer with the incorrect ones, shuffle uniformly,
/// and record where the correct answer landed. Takes the RNG as a
/// parameter so tests can seed it.
pub fn assemble_question<R: Rng>(raw: &RawQuestion, rng: &mut R) -> Question {
    let correct_text = clean_text(&raw.correct_answer);

    let mut choices: Vec<String> = std::iter::once(correct_text.clone())
        .chain(raw.incorrect_answers.iter().map(|a| clean_text(a)))
        .collect();

    // Providers occasionally repeat an answer; keep first occurrences only
    let mut seen = HashSet::new();
    choices.retain(|c| seen.insert(c.clone()));

    choices.shuffle(rng);

    let correct_index = choices
        .iter()
        .position(|c| *c == correct_text)
        .unwrap_or(0);

    Question {
        category: clean_text(&raw.category),
        prompt: clean_text(&raw.question),
        choices,
        correct_index,
    }
}

/// HTTP provider speaking the OpenTDB API: a session token is requested
/// once at startup and rides along on every batch request for the rest of
/// the process lifetime.
pub struct OpenTdbProvider {
    client: reqwest::Client,
    api_url: String,
    token: String,
    batch_size: u32,
    filter: StaleFilter,
}

impl OpenTdbProvider {
    /// Perform the session-token handshake and build the provider.
    pub async fn connect(config: &BotConfig) -> ProviderResult<Self> {
        let filter = StaleFilter::new(&config.stale_pattern, &config.stale_category)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let token: TokenResponse = client
            .get(&config.trivia_token_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::info!("Trivia provider session established");

        Ok(Self {
            client,
            api_url: config.trivia_api_url.clone(),
            token: token.token,
            batch_size: config.batch_size,
            filter,
        })
    }
}

#[async_trait]
impl QuestionProvider for OpenTdbProvider {
    async fn fetch_question(&self) -> ProviderResult<Question> {
        let response: BatchResponse = self
            .client
            .get(&self.api_url)
            .query(&[
                ("amount", self.batch_size.to_string()),
                ("token", self.token.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.response_code != 0 {
            return Err(ProviderError::Api(response.response_code));
        }

        let mut candidates = self.filter.apply(response.results);
        if candidates.is_empty() {
            return Err(ProviderError::EmptyBatch);
        }

        let mut rng = rand::rng();
        let picked = candidates.swap_remove(rng.random_range(0..candidates.len()));

        tracing::debug!(category = %picked.category, "Selected trivia question");
        Ok(assemble_question(&picked, &mut rng))
    }
}
