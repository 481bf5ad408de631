use std::time::Instant;

use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizbot::config::BotConfig;
use quizbot::gateway;
use quizbot::provider::OpenTdbProvider;
use quizbot::round::{Event, RoundConfig, RoundController};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quizbot...");

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let provider = match OpenTdbProvider::connect(&config).await {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!("Failed to reach the trivia provider: {e}");
            std::process::exit(1);
        }
    };

    let (ws_gateway, mut reader) = match gateway::connect(&config.chat_url, &config.chat_token).await
    {
        Ok(halves) => halves,
        Err(e) => {
            tracing::error!("Failed to connect to chat: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!("Connected to chat ({})", config.chat_url);

    let (tx, mut rx) = mpsc::channel::<Event>(64);

    // Wire reader task: decodes frames and feeds the single consumer
    let reader_tx = tx.clone();
    let reader_task = tokio::spawn(async move {
        while let Some(event) = reader.next_event().await {
            if reader_tx.send(Event::Chat(event)).await.is_err() {
                break;
            }
        }
    });

    let mut controller = RoundController::new(
        Box::new(ws_gateway),
        Box::new(provider),
        RoundConfig::from(&config),
        tx,
    );

    // Single consumer: every state transition happens here
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            controller.handle(event, Instant::now()).await;
        }
    });

    let _ = reader_task.await;
    tracing::error!("Chat connection closed, shutting down");
    std::process::exit(1);
}
