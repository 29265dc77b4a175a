//! Provider-specific request plumbing
//!
//! A [`Transport`] is built per request from the provider's shared
//! [`ProviderRuntime`]. It resolves the endpoint and headers, applies
//! envelope changes to the adapter's payload, keeps credentials current and
//! issues the call through the provider's request queue.

mod anthropic;
mod code_assist;
mod openai;
mod runtime;
mod vertex;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use switchyard_config::ProviderKind;
use switchyard_ratelimit::RequestQueue;

pub use self::anthropic::AnthropicTransport;
pub use self::code_assist::CodeAssistTransport;
pub use self::openai::{LiteLlmTransport, OpenAiTransport, litellm_extra_headers};
pub use self::runtime::ProviderRuntime;
pub use self::vertex::{VertexModel, VertexPublisher, VertexTransport};
use crate::adapter::Adapter;
use crate::error::LlmError;
use crate::protocol::ProviderPayload;
use crate::stream::StreamFormat;

/// Hard ceiling on receiving response headers from OAuth-backed providers
pub const OAUTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Static facts about a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportDescriptor {
    /// Provider name from configuration
    pub name: String,
    /// Human-readable name
    pub display_name: String,
    /// Format of the streaming response body
    pub stream_format: StreamFormat,
}

/// Per-call options applied when issuing the request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Bound on waiting for response headers
    pub timeout: Option<Duration>,
}

/// Uniform capability set every provider transport offers
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    fn descriptor(&self) -> &TransportDescriptor;

    /// Adapter shaping requests for this provider and model
    fn adapter(&self) -> Adapter;

    /// Full URL the request is posted to
    fn endpoint(&self) -> Result<String, LlmError>;

    /// Request headers; call after [`refresh_auth`](Self::refresh_auth)
    fn headers(&self) -> Result<HeaderMap, LlmError>;

    /// Envelope changes applied at the transport boundary
    fn transform_payload(&self, payload: ProviderPayload) -> Result<ProviderPayload, LlmError> {
        Ok(payload)
    }

    /// Fields merged into the serialized payload
    fn extra_payload_fields(&self) -> Map<String, Value> {
        Map::new()
    }

    fn request_options(&self) -> RequestOptions {
        RequestOptions::default()
    }

    /// Make sure credentials are usable; cheap when they already are
    async fn refresh_auth(&mut self) -> Result<(), LlmError> {
        Ok(())
    }

    /// Discard current credentials and obtain new ones
    async fn force_refresh_auth(&mut self) -> Result<(), LlmError> {
        Ok(())
    }

    /// Whether a 401 is worth one forced refresh and retry
    fn uses_oauth(&self) -> bool {
        false
    }

    fn queue(&self) -> &RequestQueue;
}

/// Closed set of transports
#[derive(Debug)]
pub enum Transport {
    /// Anthropic and vendors speaking the Messages API
    AnthropicCompatible(AnthropicTransport),
    /// OpenAI and OpenRouter
    OpenAiCompatible(OpenAiTransport),
    /// LiteLLM proxy
    LiteLlm(LiteLlmTransport),
    /// Gemini through the Code Assist endpoint
    GeminiCodeAssist(CodeAssistTransport),
    /// Vertex AI publisher models
    Vertex(VertexTransport),
}

macro_rules! delegate {
    ($self:expr, $transport:ident => $call:expr) => {
        match $self {
            Transport::AnthropicCompatible($transport) => $call,
            Transport::OpenAiCompatible($transport) => $call,
            Transport::LiteLlm($transport) => $call,
            Transport::GeminiCodeAssist($transport) => $call,
            Transport::Vertex($transport) => $call,
        }
    };
}

impl Transport {
    /// Transport for one request to `model` on `runtime`'s provider
    pub fn for_model(runtime: Arc<ProviderRuntime>, model: &str) -> Result<Self, LlmError> {
        Ok(match runtime.config().kind {
            ProviderKind::Anthropic | ProviderKind::AnthropicCompatible => {
                Self::AnthropicCompatible(AnthropicTransport::new(runtime))
            }
            ProviderKind::Openai | ProviderKind::Openrouter => {
                Self::OpenAiCompatible(OpenAiTransport::new(runtime, model))
            }
            ProviderKind::Litellm => Self::LiteLlm(LiteLlmTransport::new(runtime, model)),
            ProviderKind::GeminiCodeAssist => Self::GeminiCodeAssist(CodeAssistTransport::new(runtime, model)),
            ProviderKind::Vertex => Self::Vertex(VertexTransport::new(runtime, model)?),
        })
    }

    /// Run `fetch` through this provider's request queue
    pub async fn enqueue_request<F, Fut, T>(&self, fetch: F) -> Result<T, LlmError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, LlmError>> + Send,
        T: Send,
    {
        self.queue().enqueue(fetch).await
    }

    /// Post `body` and return the successful response
    ///
    /// A 401 from an OAuth-backed provider triggers one forced refresh and
    /// one retry; a second 401 is final. Other non-success statuses are
    /// returned as [`LlmError::Upstream`].
    pub async fn send(&mut self, body: &Value) -> Result<reqwest::Response, LlmError> {
        let mut refreshed = false;

        loop {
            let response = self.send_once(body).await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                let provider = self.descriptor().name.clone();
                if self.uses_oauth() && !refreshed {
                    tracing::warn!(provider = %provider, "upstream rejected token, refreshing");
                    refreshed = true;
                    self.force_refresh_auth().await?;
                    continue;
                }
                let detail = response.text().await.unwrap_or_default();
                return Err(LlmError::AuthFailure {
                    provider,
                    message: format!("upstream returned 401: {detail}"),
                });
            }

            if !status.is_success() {
                let provider = self.descriptor().name.clone();
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(provider = %provider, status = status.as_u16(), "upstream request failed");
                return Err(LlmError::Upstream {
                    provider,
                    status: status.as_u16(),
                    body,
                });
            }

            return Ok(response);
        }
    }

    async fn send_once(&self, body: &Value) -> Result<reqwest::Response, LlmError> {
        let provider = self.descriptor().name.clone();
        let endpoint = self.endpoint()?;
        let headers = self.headers()?;
        let options = self.request_options();
        let request = self.client().post(&endpoint).headers(headers).json(body);

        tracing::debug!(provider = %provider, endpoint = %endpoint, "dispatching upstream request");

        let call_provider = provider.clone();
        let call = self.enqueue_request(|| async move {
            request
                .send()
                .await
                .map_err(|e| LlmError::transport(&call_provider, &e))
        });

        // The limit covers the wait for a queue slot as well as the call
        let Some(limit) = options.timeout else {
            return call.await;
        };
        tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
            tracing::warn!(provider = %provider, timeout = ?limit, "upstream request timed out");
            Err(LlmError::Timeout { provider })
        })
    }

    fn client(&self) -> &reqwest::Client {
        delegate!(self, t => t.runtime().client())
    }
}

#[async_trait]
impl ProviderTransport for Transport {
    fn descriptor(&self) -> &TransportDescriptor {
        delegate!(self, t => t.descriptor())
    }

    fn adapter(&self) -> Adapter {
        delegate!(self, t => t.adapter())
    }

    fn endpoint(&self) -> Result<String, LlmError> {
        delegate!(self, t => t.endpoint())
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        delegate!(self, t => t.headers())
    }

    fn transform_payload(&self, payload: ProviderPayload) -> Result<ProviderPayload, LlmError> {
        delegate!(self, t => t.transform_payload(payload))
    }

    fn extra_payload_fields(&self) -> Map<String, Value> {
        delegate!(self, t => t.extra_payload_fields())
    }

    fn request_options(&self) -> RequestOptions {
        delegate!(self, t => t.request_options())
    }

    async fn refresh_auth(&mut self) -> Result<(), LlmError> {
        delegate!(self, t => t.refresh_auth().await)
    }

    async fn force_refresh_auth(&mut self) -> Result<(), LlmError> {
        delegate!(self, t => t.force_refresh_auth().await)
    }

    fn uses_oauth(&self) -> bool {
        delegate!(self, t => t.uses_oauth())
    }

    fn queue(&self) -> &RequestQueue {
        delegate!(self, t => t.queue())
    }
}

/// `{base}{path}` without doubling the slash between them
fn join_url(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

fn header_value(provider: &str, value: &str) -> Result<HeaderValue, LlmError> {
    HeaderValue::from_str(value).map_err(|e| LlmError::configuration(provider, format!("invalid header value: {e}")))
}

/// `Authorization: Bearer <secret>`, marked sensitive
fn bearer(provider: &str, secret: &SecretString) -> Result<HeaderValue, LlmError> {
    let mut value = header_value(provider, &format!("Bearer {}", secret.expose_secret()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Headers common to every JSON request
fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(http::header::ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers
}

#[cfg(test)]
mod tests {
    use switchyard_auth::StaticTokenSource;
    use switchyard_config::ProviderConfig;

    use super::*;

    #[test]
    fn joins_without_double_slash() {
        assert_eq!(join_url("https://a.test/", "/v1/messages"), "https://a.test/v1/messages");
        assert_eq!(join_url("https://a.test/api", "/v1/messages"), "https://a.test/api/v1/messages");
    }

    #[test]
    fn bearer_is_sensitive() {
        let value = bearer("p", &SecretString::from("sk-1")).unwrap();
        assert!(value.is_sensitive());
        assert_eq!(value.to_str().unwrap(), "Bearer sk-1");
    }

    #[tokio::test(start_paused = true)]
    async fn oauth_timeout_covers_waiting_for_a_queue_slot() {
        let mut config = ProviderConfig::new(ProviderKind::GeminiCodeAssist);
        config.project_id = Some("proj-1".to_owned());
        config.base_url = Some("http://127.0.0.1:9".parse().unwrap());
        config.queue.max_concurrent = 1;
        let runtime = ProviderRuntime::new("gemini", config, reqwest::Client::new())
            .unwrap()
            .with_token_source(Arc::new(StaticTokenSource::new(SecretString::from("ya29.token"))));
        let runtime = Arc::new(runtime);

        let held = runtime.queue().acquire().await.unwrap();

        let mut transport = Transport::for_model(Arc::clone(&runtime), "gemini-2.5-pro").unwrap();
        transport.refresh_auth().await.unwrap();

        let result = transport.send(&serde_json::json!({})).await;
        assert!(matches!(result, Err(LlmError::Timeout { ref provider }) if provider == "gemini"));

        // The abandoned waiter never took a slot
        assert_eq!(runtime.queue().in_flight(), 1);
        drop(held);
        assert_eq!(runtime.queue().in_flight(), 0);
    }
}
