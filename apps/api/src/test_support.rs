//! In-process stand-in for the Ollama HTTP API, used by tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower::ServiceExt;

use crate::config::LlmSettings;
use crate::ollama_client::{OllamaClient, RetryPolicy};
use crate::state::AppState;

pub const TEST_MODEL: &str = "test-model";
pub const TEST_SYSTEM_PROMPT: &str = "Extrahera organisatorisk enhet som JSON.";

/// One scripted backend reply. The last reply in a script repeats forever.
#[derive(Clone)]
pub enum StubReply {
    Json(u16, Value),
    Raw(u16, &'static str),
    Delayed(Duration, Value),
}

impl StubReply {
    pub fn json(status: u16, body: Value) -> Self {
        StubReply::Json(status, body)
    }

    pub fn raw(status: u16, body: &'static str) -> Self {
        StubReply::Raw(status, body)
    }

    pub fn delayed(delay: Duration, body: Value) -> Self {
        StubReply::Delayed(delay, body)
    }

    async fn respond(self) -> Response {
        match self {
            StubReply::Json(status, body) => (status_code(status), Json(body)).into_response(),
            StubReply::Raw(status, body) => (status_code(status), body).into_response(),
            StubReply::Delayed(delay, body) => {
                tokio::time::sleep(delay).await;
                (StatusCode::OK, Json(body)).into_response()
            }
        }
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap()
}

struct StubInner {
    script: Vec<StubReply>,
    /// Fixed `/api/version` reply; when unset the version route shares `script`.
    version: Option<StubReply>,
    hits: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
    hit_times: Mutex<Vec<Instant>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StubInner {
    fn next_reply(&self) -> StubReply {
        self.hit_times.lock().unwrap().push(Instant::now());
        let n = self.hits.fetch_add(1, Ordering::SeqCst);
        self.script[n.min(self.script.len() - 1)].clone()
    }
}

/// Counts a generate request as in flight until dropped, including when the client hangs up.
struct InFlight(Arc<StubInner>);

impl InFlight {
    fn enter(inner: &Arc<StubInner>) -> Self {
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(inner.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct StubBackend {
    pub base_url: String,
    inner: Arc<StubInner>,
}

impl StubBackend {
    /// Serves `/api/generate` and `/api/version` from `script` on an ephemeral port.
    pub async fn spawn(script: Vec<StubReply>) -> Self {
        Self::start(script, None).await
    }

    /// Like [`StubBackend::spawn`], but `/api/version` always answers with `version`.
    pub async fn spawn_with_version(script: Vec<StubReply>, version: StubReply) -> Self {
        Self::start(script, Some(version)).await
    }

    async fn start(script: Vec<StubReply>, version: Option<StubReply>) -> Self {
        assert!(!script.is_empty(), "stub script must not be empty");
        let inner = Arc::new(StubInner {
            script,
            version,
            hits: AtomicUsize::new(0),
            bodies: Mutex::new(Vec::new()),
            hit_times: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api/generate", post(generate))
            .route("/api/version", get(self::version))
            .with_state(inner.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            inner,
        }
    }

    pub fn hits(&self) -> usize {
        self.inner.hits.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.inner.bodies.lock().unwrap().clone()
    }

    /// Arrival time of every scripted request, in order.
    pub fn hit_times(&self) -> Vec<Instant> {
        self.inner.hit_times.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Most generate requests ever handled at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak_in_flight.load(Ordering::SeqCst)
    }
}

async fn generate(State(inner): State<Arc<StubInner>>, Json(body): Json<Value>) -> Response {
    let _in_flight = InFlight::enter(&inner);
    inner.bodies.lock().unwrap().push(body);
    inner.next_reply().respond().await
}

async fn version(State(inner): State<Arc<StubInner>>) -> Response {
    match inner.version.clone() {
        Some(reply) => reply.respond().await,
        None => inner.next_reply().respond().await,
    }
}

/// A base URL nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Three attempts with millisecond backoff and sub-second timeouts.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(10),
        request_timeout: Duration::from_millis(500),
        health_timeout: Duration::from_millis(500),
    }
}

pub fn test_state(base_url: &str) -> AppState {
    let settings = LlmSettings {
        model: TEST_MODEL.to_string(),
        system_prompt: TEST_SYSTEM_PROMPT.to_string(),
    };

    AppState {
        ollama: OllamaClient::new(base_url, fast_policy()).unwrap(),
        settings: Arc::new(settings),
    }
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Sends one request through `app`, returning the status and JSON body (`Null` if not JSON).
pub async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}
