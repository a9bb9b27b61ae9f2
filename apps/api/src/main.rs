mod config;
mod errors;
mod extraction;
mod ollama_client;
mod routes;
mod state;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LlmSettings};
use crate::ollama_client::{OllamaClient, RetryPolicy};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting department extractor v{}", env!("CARGO_PKG_VERSION"));

    // Model and default instruction prompt, immutable for the process lifetime
    let settings = LlmSettings::from_file(&config.llm_settings_path)?;
    info!(
        "LLM settings loaded from {} (model: {})",
        config.llm_settings_path, settings.model
    );

    // One pooled client shared by all requests
    let ollama = OllamaClient::new(config.ollama_url.clone(), RetryPolicy::default())?;
    info!("Ollama client initialized ({})", ollama.base_url());

    let state = AppState {
        ollama,
        settings: Arc::new(settings),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
