//! Mock upstream provider for integration tests
//!
//! Serves canned streaming responses in the OpenAI, Anthropic and Gemini
//! Code Assist formats, plus an OAuth token endpoint. Every request body and
//! `Authorization` header is recorded.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use tokio_util::sync::CancellationToken;

pub const OPENAI_STREAM: &str = concat!(
    "data: {\"id\":\"chatcmpl-mock\",\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"Hello\"}}]}\n\n",
    "data: {\"id\":\"chatcmpl-mock\",\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\n",
    "data: {\"id\":\"chatcmpl-mock\",\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: {\"id\":\"chatcmpl-mock\",\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2}}\n\n",
    "data: [DONE]\n\n",
);

pub const ANTHROPIC_STREAM: &str = concat!(
    "event: message_start\n",
    "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_mock\",\"type\":\"message\",\"role\":\"assistant\",\"model\":\"claude-sonnet-4\",\"content\":[],\"stop_reason\":null,\"usage\":{\"input_tokens\":14,\"output_tokens\":1}}}\n\n",
    "event: content_block_start\n",
    "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
    "event: content_block_stop\n",
    "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
    "event: message_delta\n",
    "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\",\"stop_sequence\":null},\"usage\":{\"output_tokens\":3}}\n\n",
    "event: message_stop\n",
    "data: {\"type\":\"message_stop\"}\n\n",
);

pub const CODE_ASSIST_STREAM: &str = concat!(
    "data: {\"response\":{\"responseId\":\"resp-mock\",\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Hola\"}]}}],\"usageMetadata\":{\"promptTokenCount\":5}}}\n\n",
    "data: {\"response\":{\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"!\"}]},\"finishReason\":\"STOP\"}],\"usageMetadata\":{\"promptTokenCount\":5,\"candidatesTokenCount\":2}}}\n\n",
);

pub const DISCOVERED_PROJECT: &str = "proj-discovered";

/// Mock upstream that returns predictable streams
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    stream_requests: AtomicU32,
    token_requests: AtomicU32,
    load_requests: AtomicU32,
    /// Stream requests still to be answered with 401
    unauthorized_remaining: AtomicU32,
    bodies: Mutex<Vec<serde_json::Value>>,
    authorizations: Mutex<Vec<String>>,
}

impl MockUpstream {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(0).await
    }

    /// Answer the first `n` stream requests with 401
    pub async fn start_unauthorized(n: u32) -> anyhow::Result<Self> {
        Self::start_inner(n).await
    }

    async fn start_inner(unauthorized: u32) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            unauthorized_remaining: AtomicU32::new(unauthorized),
            ..MockState::default()
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_openai))
            .route("/v1/messages", routing::post(handle_anthropic))
            .route("/v1internal:streamGenerateContent", routing::post(handle_code_assist))
            .route("/v1internal:loadCodeAssist", routing::post(handle_load))
            .route("/token", routing::post(handle_token))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Server root, e.g. `http://127.0.0.1:1234`
    pub fn root_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Base URL for OpenAI-style providers, which append `/chat/completions`
    pub fn openai_base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    pub fn stream_requests(&self) -> u32 {
        self.state.stream_requests.load(Ordering::SeqCst)
    }

    pub fn token_requests(&self) -> u32 {
        self.state.token_requests.load(Ordering::SeqCst)
    }

    pub fn load_requests(&self) -> u32 {
        self.state.load_requests.load(Ordering::SeqCst)
    }

    /// Bodies of every stream request, in arrival order
    pub fn bodies(&self) -> Vec<serde_json::Value> {
        self.state.bodies.lock().unwrap().clone()
    }

    /// `Authorization` headers of every stream request, in arrival order
    pub fn authorizations(&self) -> Vec<String> {
        self.state.authorizations.lock().unwrap().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl MockState {
    /// Record the request; `Some` carries the 401 to send instead of a stream
    fn record(&self, headers: &HeaderMap, body: serde_json::Value) -> Option<Response> {
        self.stream_requests.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push(body);
        let authorization = headers
            .get(header::AUTHORIZATION)
            .or_else(|| headers.get("x-api-key"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        self.authorizations.lock().unwrap().push(authorization);

        let rejected = self
            .unauthorized_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        rejected.then(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": {"message": "invalid token"}})),
            )
                .into_response()
        })
    }
}

fn sse(body: &'static str) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn handle_openai(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.record(&headers, body).unwrap_or_else(|| sse(OPENAI_STREAM))
}

async fn handle_anthropic(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.record(&headers, body).unwrap_or_else(|| sse(ANTHROPIC_STREAM))
}

async fn handle_code_assist(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.record(&headers, body).unwrap_or_else(|| sse(CODE_ASSIST_STREAM))
}

async fn handle_load(State(state): State<Arc<MockState>>) -> Response {
    state.load_requests.fetch_add(1, Ordering::SeqCst);
    Json(serde_json::json!({"cloudaicompanionProject": {"id": DISCOVERED_PROJECT}})).into_response()
}

/// Issues `token-1`, `token-2`, ... on successive refreshes
async fn handle_token(State(state): State<Arc<MockState>>, body: String) -> Response {
    if !body.contains("grant_type=refresh_token") {
        return (StatusCode::BAD_REQUEST, "unsupported grant").into_response();
    }
    let n = state.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    Json(serde_json::json!({"access_token": format!("token-{n}"), "expires_in": 3600})).into_response()
}
