use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;
use switchyard_auth::AccessToken;
use switchyard_ratelimit::RequestQueue;

use super::{
    OAUTH_REQUEST_TIMEOUT, ProviderRuntime, ProviderTransport, RequestOptions, TransportDescriptor, bearer,
    json_headers,
};
use crate::adapter::{Adapter, GeminiAdapter, PassthroughAdapter};
use crate::error::LlmError;
use crate::protocol::ProviderPayload;
use crate::stream::StreamFormat;

const DEFAULT_REGION: &str = "us-central1";

/// Model publisher on Vertex AI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexPublisher {
    Google,
    Anthropic,
}

impl VertexPublisher {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for VertexPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `publisher/model` identifier; the publisher defaults to Google
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexModel {
    pub publisher: VertexPublisher,
    pub model: String,
}

impl VertexModel {
    pub fn parse(provider: &str, model_id: &str) -> Result<Self, LlmError> {
        let Some((publisher, model)) = model_id.split_once('/') else {
            return Ok(Self {
                publisher: VertexPublisher::Google,
                model: model_id.to_owned(),
            });
        };

        let publisher = match publisher.to_ascii_lowercase().as_str() {
            "google" => VertexPublisher::Google,
            "anthropic" => VertexPublisher::Anthropic,
            other => {
                return Err(LlmError::configuration(
                    provider,
                    format!("unsupported Vertex publisher '{other}'"),
                ));
            }
        };

        Ok(Self {
            publisher,
            model: model.to_owned(),
        })
    }
}

/// Vertex AI publisher models, authenticated with OAuth
///
/// Google models stream through `streamGenerateContent`; Anthropic models
/// take the Messages body through `streamRawPredict`.
#[derive(Debug)]
pub struct VertexTransport {
    runtime: Arc<ProviderRuntime>,
    descriptor: TransportDescriptor,
    target: VertexModel,
    token: Option<AccessToken>,
}

impl VertexTransport {
    pub fn new(runtime: Arc<ProviderRuntime>, model_id: &str) -> Result<Self, LlmError> {
        let target = VertexModel::parse(runtime.name(), model_id)?;
        let stream_format = match target.publisher {
            VertexPublisher::Google => StreamFormat::GeminiSse,
            VertexPublisher::Anthropic => StreamFormat::AnthropicSse,
        };
        let descriptor = TransportDescriptor {
            name: runtime.name().to_owned(),
            display_name: runtime.display_name().to_owned(),
            stream_format,
        };

        Ok(Self {
            runtime,
            descriptor,
            target,
            token: None,
        })
    }

    pub const fn target(&self) -> &VertexModel {
        &self.target
    }

    pub(super) fn runtime(&self) -> &ProviderRuntime {
        &self.runtime
    }

    fn host(&self, region: &str) -> String {
        if let Some(base) = &self.runtime.config().base_url {
            return base.as_str().trim_end_matches('/').to_owned();
        }
        if region == "global" {
            "https://aiplatform.googleapis.com".to_owned()
        } else {
            format!("https://{region}-aiplatform.googleapis.com")
        }
    }
}

#[async_trait]
impl ProviderTransport for VertexTransport {
    fn descriptor(&self) -> &TransportDescriptor {
        &self.descriptor
    }

    fn adapter(&self) -> Adapter {
        match self.target.publisher {
            VertexPublisher::Google => Adapter::Gemini(GeminiAdapter::new()),
            VertexPublisher::Anthropic => Adapter::Passthrough(PassthroughAdapter::new("anthropic")),
        }
    }

    fn endpoint(&self) -> Result<String, LlmError> {
        let config = self.runtime.config();
        let project = config
            .project_id
            .as_deref()
            .ok_or_else(|| LlmError::configuration(self.runtime.name(), "project_id is required"))?;
        let region = config.region.as_deref().unwrap_or(DEFAULT_REGION);

        let method = match self.target.publisher {
            VertexPublisher::Google => "streamGenerateContent?alt=sse",
            VertexPublisher::Anthropic => "streamRawPredict",
        };

        Ok(format!(
            "{}/v1/projects/{project}/locations/{region}/publishers/{}/models/{}:{method}",
            self.host(region),
            self.target.publisher,
            self.target.model,
        ))
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let name = self.runtime.name();
        let token = self.token.as_ref().ok_or_else(|| LlmError::AuthFailure {
            provider: name.to_owned(),
            message: "no access token acquired".to_owned(),
        })?;

        let mut headers = json_headers();
        headers.insert(http::header::AUTHORIZATION, bearer(name, token.secret())?);
        Ok(headers)
    }

    fn transform_payload(&self, payload: ProviderPayload) -> Result<ProviderPayload, LlmError> {
        Ok(match payload {
            ProviderPayload::Anthropic(inner) => ProviderPayload::VertexAnthropic(inner.into()),
            other => other,
        })
    }

    fn request_options(&self) -> RequestOptions {
        RequestOptions {
            timeout: Some(OAUTH_REQUEST_TIMEOUT),
        }
    }

    async fn refresh_auth(&mut self) -> Result<(), LlmError> {
        let name = self.runtime.name();
        let token = self
            .runtime
            .auth()
            .await?
            .access_token()
            .await
            .map_err(|e| LlmError::auth(name, &e))?;
        self.token = Some(token);
        Ok(())
    }

    async fn force_refresh_auth(&mut self) -> Result<(), LlmError> {
        let name = self.runtime.name();
        let manager = self.runtime.auth().await?;
        let token = match &self.token {
            Some(stale) => manager.refresh_after(stale.generation()).await,
            None => manager.refresh_token().await,
        }
        .map_err(|e| LlmError::auth(name, &e))?;

        self.token = Some(token);
        Ok(())
    }

    fn uses_oauth(&self) -> bool {
        true
    }

    fn queue(&self) -> &RequestQueue {
        self.runtime.queue()
    }
}
