use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::error;

use crate::state::AppState;

/// GET /health
/// Probes Ollama's `/api/version`. Always 200; backend trouble is reported in the body.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    match state.ollama.probe_version().await {
        Ok(()) => Json(json!({
            "status": "healthy",
            "ollama": "connected"
        })),
        Err(e) => {
            error!("Health check failed: {e}");
            Json(json!({
                "status": "unhealthy",
                "error": e.to_string()
            }))
        }
    }
}
