//! Response normalizer: reads the generated text out of an Ollama envelope and parses it as JSON.
//!
//! Parse failures never escalate. The backend was reachable, so the caller gets an
//! empty `content` instead of an error status.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

/// Text used when the envelope carries no `response` field.
const EMPTY_OBJECT_TEXT: &str = "{}";

#[derive(Debug, Error)]
pub enum ParseFault {
    #[error("'response' field is not text")]
    NonTextResponse,

    #[error("generated text is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Outbound body of `/extract_department`. `content` serializes as `null` when unusable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedResult {
    pub content: Option<Value>,
}

/// Normalizes a raw envelope. Always succeeds; unparseable text yields `content: None`.
pub fn normalize(envelope: &Value) -> NormalizedResult {
    let raw = match response_text(envelope) {
        Ok(raw) => raw,
        Err(e) => {
            error!("Error parsing response: {e} (raw: {:?})", envelope.get("response"));
            return NormalizedResult { content: None };
        }
    };

    match parse_content(raw) {
        Ok(content) => NormalizedResult {
            content: Some(content),
        },
        Err(e) => {
            error!("Error parsing response: {e} (raw: {raw:?})");
            NormalizedResult { content: None }
        }
    }
}

/// Extracts the generated text. A missing field reads as an empty JSON object.
pub fn response_text(envelope: &Value) -> Result<&str, ParseFault> {
    match envelope.get("response") {
        None => Ok(EMPTY_OBJECT_TEXT),
        Some(Value::String(text)) => Ok(text.as_str()),
        Some(_) => Err(ParseFault::NonTextResponse),
    }
}

/// Parses generated text as JSON after stripping code fences. Any JSON type is accepted.
pub fn parse_content(raw: &str) -> Result<Value, ParseFault> {
    Ok(serde_json::from_str(clean_fences(raw))?)
}

/// Strips ```json ... ``` or ``` ... ``` code fences and surrounding whitespace.
/// Text without fences is only trimmed.
pub fn clean_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));

    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped
                .strip_suffix("```")
                .map(|s| s.trim())
                .unwrap_or(stripped)
        }
        None => text.strip_suffix("```").map(|s| s.trim_end()).unwrap_or(text),
    }
}
