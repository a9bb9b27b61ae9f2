//! Axum route handler for department extraction.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::normalizer::{normalize, NormalizedResult};
use crate::ollama_client::prompts::build_prompt;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractDepartmentRequest {
    pub title: String,
    /// Replaces the default instruction prompt from the settings file.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl ExtractDepartmentRequest {
    /// The caller's instruction if given and non-blank, else the configured default.
    fn instruction<'a>(&'a self, default: &'a str) -> &'a str {
        self.system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(default)
    }
}

/// POST /extract_department
///
/// 503 when Ollama cannot be reached after all retries. Unusable generated text is
/// still a 200, with `content: null`. Bodies axum cannot decode are a 422.
pub async fn handle_extract_department(
    State(state): State<AppState>,
    payload: Result<Json<ExtractDepartmentRequest>, JsonRejection>,
) -> Result<Json<NormalizedResult>, AppError> {
    let Json(request) = payload?;
    if request.title.trim().is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }

    let span = info_span!("extract_department", request_id = %Uuid::new_v4());
    let result = extract(&state, &request).instrument(span).await?;

    Ok(Json(result))
}

async fn extract(
    state: &AppState,
    request: &ExtractDepartmentRequest,
) -> Result<NormalizedResult, AppError> {
    info!("Received request with title: {}", request.title);

    let prompt = build_prompt(
        request.instruction(&state.settings.system_prompt),
        &request.title,
    );
    let envelope = state
        .ollama
        .generate(&state.settings.model, &prompt)
        .await?;

    Ok(normalize(&envelope))
}
