use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

const DEFAULT_OLLAMA_URL: &str = "http://ollama:11434";
const DEFAULT_SETTINGS_PATH: &str = "llm_settings.json";

/// Process configuration loaded from environment variables.
/// Fails at startup if a variable is present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub ollama_url: String,
    pub llm_settings_path: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            ollama_url: env_or("OLLAMA_URL", DEFAULT_OLLAMA_URL)
                .trim_end_matches('/')
                .to_string(),
            llm_settings_path: env_or("LLM_SETTINGS_PATH", DEFAULT_SETTINGS_PATH),
            port: env_or("PORT", "8000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Model identifier and default instruction prompt, read once from the settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    pub model: String,
    pub system_prompt: String,
}

impl LlmSettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read LLM settings from '{}'", path.display()))?;
        let settings: LlmSettings = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid LLM settings in '{}'", path.display()))?;

        if settings.model.trim().is_empty() {
            bail!("LLM settings in '{}' have an empty model", path.display());
        }

        Ok(settings)
    }
}
