//! Environment-based configuration

use std::time::Duration;

const DEFAULT_CHAT_URL: &str = "wss://chat2.strims.gg/ws";
const DEFAULT_TRIVIA_API_URL: &str = "https://opentdb.com/api.php";
const DEFAULT_TRIVIA_TOKEN_URL: &str = "https://opentdb.com/api_token.php?command=request";
const DEFAULT_BATCH_SIZE: u32 = 10;
const DEFAULT_ROUND_SECONDS: u64 = 20;
const DEFAULT_START_COMMAND: &str = "!trivia";
/// A four-digit 19xx year in a music question usually means the question
/// has aged out of its category
const DEFAULT_STALE_PATTERN: &str = r"19\d{2}";
const DEFAULT_STALE_CATEGORY: &str = "Entertainment: Music";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("STRIMS_TOKEN is not set (required to authenticate the chat connection)")]
    MissingChatToken,
}

/// Bot configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Websocket chat endpoint
    pub chat_url: String,
    /// JWT used as the chat auth cookie
    pub chat_token: String,
    /// Trivia batch endpoint
    pub trivia_api_url: String,
    /// Trivia session-token endpoint
    pub trivia_token_url: String,
    /// Questions requested per batch
    pub batch_size: u32,
    /// Answer window per round
    pub round_seconds: u64,
    /// Broadcast prefix that starts a round
    pub start_command: String,
    /// Regex marking stale question text
    pub stale_pattern: String,
    /// Category the stale pattern applies to
    pub stale_category: String,
}

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl BotConfig {
    /// Load configuration from environment variables. Only the chat token
    /// is required; everything else falls back to a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let chat_token = env_trimmed("STRIMS_TOKEN").ok_or(ConfigError::MissingChatToken)?;

        Ok(Self {
            chat_url: env_trimmed("CHAT_URL").unwrap_or_else(|| DEFAULT_CHAT_URL.to_string()),
            chat_token,
            trivia_api_url: env_trimmed("TRIVIA_API_URL")
                .unwrap_or_else(|| DEFAULT_TRIVIA_API_URL.to_string()),
            trivia_token_url: env_trimmed("TRIVIA_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_TRIVIA_TOKEN_URL.to_string()),
            batch_size: env_trimmed("TRIVIA_BATCH_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BATCH_SIZE),
            round_seconds: env_trimmed("ROUND_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_ROUND_SECONDS),
            start_command: env_trimmed("START_COMMAND")
                .unwrap_or_else(|| DEFAULT_START_COMMAND.to_string()),
            stale_pattern: env_trimmed("STALE_PATTERN")
                .unwrap_or_else(|| DEFAULT_STALE_PATTERN.to_string()),
            stale_category: env_trimmed("STALE_CATEGORY")
                .unwrap_or_else(|| DEFAULT_STALE_CATEGORY.to_string()),
        })
    }

    pub fn round_window(&self) -> Duration {
        Duration::from_secs(self.round_seconds)
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            chat_url: DEFAULT_CHAT_URL.to_string(),
            chat_token: String::new(),
            trivia_api_url: DEFAULT_TRIVIA_API_URL.to_string(),
            trivia_token_url: DEFAULT_TRIVIA_TOKEN_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            round_seconds: DEFAULT_ROUND_SECONDS,
            start_command: DEFAULT_START_COMMAND.to_string(),
            stale_pattern: DEFAULT_STALE_PATTERN.to_string(),
            stale_category: DEFAULT_STALE_CATEGORY.to_string(),
        }
    }
}
