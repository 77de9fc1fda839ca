// src/main.rs

use std::sync::Arc;

use g8::config::Config;
use g8::llm::{DynLlm, HttpLlmClient};
use g8::routes;
use g8::state::AppState;
use g8::store::{DynStore, MemoryStore, PgStore};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (and .env, if present)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store: DynStore = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect(url).await?),
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store. Data is lost on exit.");
            Arc::new(MemoryStore::new())
        }
    };

    let llm: DynLlm = Arc::new(HttpLlmClient::new(&config.ai)?);
    if config.ai.engines.is_empty() {
        tracing::warn!("No AI engines configured; AI endpoints will fail.");
    }

    let state = AppState::new(store, llm, config.clone());
    if state.admins.is_empty() {
        tracing::warn!("ADMIN_EMAILS is empty; admin endpoints will reject everyone.");
    } else {
        tracing::info!("{} admin account(s) configured", state.admins.len());
    }

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    // Start the server
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Never resolves, so the server keeps running.
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
