use std::sync::Arc;

use crate::config::LlmSettings;
use crate::ollama_client::OllamaClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pooled client shared by every in-flight request; the pool caps backend connections.
    pub ollama: OllamaClient,
    /// Model and default instruction prompt, read once at startup.
    pub settings: Arc<LlmSettings>,
}
