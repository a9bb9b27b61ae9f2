//! Ollama client: the single point of entry for all calls to the generation backend.
//!
//! No other module talks to Ollama directly. Generation calls are retried with
//! linear backoff; anything deeper than the HTTP envelope is left to the caller.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub mod prompts;

const GENERATE_PATH: &str = "/api/generate";
const VERSION_PATH: &str = "/api/version";
/// Idle keep-alive connections kept per backend host.
const MAX_KEEPALIVE_CONNECTIONS: usize = 5;
/// Concurrent in-flight generation calls across all requests.
const MAX_CONNECTIONS: usize = 10;

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ollama returned status {0}")]
    Status(u16),

    #[error("No response from Ollama after {attempts} attempts (last failure: {last_reason})")]
    Exhausted { attempts: u32, last_reason: String },
}

/// Timing and retry limits for backend calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub request_timeout: Duration,
    pub health_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(60),
            health_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-indexed). Linear: 1x, 2x, 3x the base delay.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Result of a single generation attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// HTTP 200 with a JSON envelope. Ends the retry loop.
    Success(Value),
    /// Non-200 status, timeout, transport fault or undecodable envelope.
    Retryable(String),
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Pooled HTTP client for the Ollama API, shared by all in-flight requests.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    permits: Arc<Semaphore>,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Result<Self, OllamaError> {
        let client = Client::builder()
            .pool_max_idle_per_host(MAX_KEEPALIVE_CONNECTIONS)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            policy,
            permits: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests a whole (non-streamed) generation for `prompt`.
    ///
    /// Returns the raw JSON envelope of the first attempt answered with HTTP 200.
    /// Fails with [`OllamaError::Exhausted`] once `max_retries` attempts have failed.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<Value, OllamaError> {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let max_retries = self.policy.max_retries;
        let mut last_reason = String::from("no attempt made");

        for attempt in 1..=max_retries {
            info!("Attempt {attempt} to call Ollama");

            match self.attempt(&body).await {
                AttemptOutcome::Success(payload) => return Ok(payload),
                AttemptOutcome::Retryable(reason) => {
                    error!("Attempt {attempt} failed: {reason}");
                    last_reason = reason;
                }
            }

            if attempt < max_retries {
                let delay = self.policy.backoff_delay(attempt);
                warn!("Retrying Ollama call after {}ms...", delay.as_millis());
                tokio::time::sleep(delay).await;
            }
        }

        Err(OllamaError::Exhausted {
            attempts: max_retries,
            last_reason,
        })
    }

    /// One bounded attempt. Waiting for a connection slot counts against `request_timeout`.
    async fn attempt(&self, body: &GenerateRequest<'_>) -> AttemptOutcome {
        let timeout = self.policy.request_timeout;
        match tokio::time::timeout(timeout, self.send_generate(body)).await {
            Ok(outcome) => outcome,
            Err(_) => AttemptOutcome::Retryable(format!("timeout after {}ms", timeout.as_millis())),
        }
    }

    async fn send_generate(&self, body: &GenerateRequest<'_>) -> AttemptOutcome {
        // The semaphore is never closed while the client is alive.
        let Ok(_permit) = self.permits.acquire().await else {
            return AttemptOutcome::Retryable("connection slots unavailable".to_string());
        };

        let response = self
            .client
            .post(self.url(GENERATE_PATH))
            .json(body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return AttemptOutcome::Retryable(format!("timeout: {e}")),
            Err(e) => return AttemptOutcome::Retryable(format!("unexpected error: {e}")),
        };

        let status = response.status().as_u16();
        if status != 200 {
            return AttemptOutcome::Retryable(format!("status {status}"));
        }

        // An undecodable envelope never reaches the normalizer; treat it like a transport fault.
        match response.json::<Value>().await {
            Ok(payload) => AttemptOutcome::Success(payload),
            Err(e) => AttemptOutcome::Retryable(format!("malformed envelope: {e}")),
        }
    }

    /// Liveness probe against `/api/version`. The body is ignored.
    ///
    /// Does not take a generation slot, so it answers within `health_timeout`
    /// even while every slot is busy.
    pub async fn probe_version(&self) -> Result<(), OllamaError> {
        let response = self
            .client
            .get(self.url(VERSION_PATH))
            .timeout(self.policy.health_timeout)
            .send()
            .await?;

        match response.status().as_u16() {
            200 => Ok(()),
            status => Err(OllamaError::Status(status)),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
