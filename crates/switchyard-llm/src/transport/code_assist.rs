use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;
use serde_json::json;
use switchyard_auth::AccessToken;
use switchyard_ratelimit::RequestQueue;

use super::{
    OAUTH_REQUEST_TIMEOUT, ProviderRuntime, ProviderTransport, RequestOptions, TransportDescriptor, bearer, join_url,
    json_headers,
};
use crate::adapter::{Adapter, GeminiAdapter};
use crate::error::LlmError;
use crate::protocol::ProviderPayload;
use crate::protocol::google::{CodeAssistEnvelope, LoadCodeAssistResponse};
use crate::stream::StreamFormat;

const DEFAULT_BASE_URL: &str = "https://cloudcode-pa.googleapis.com";
const STREAM_PATH: &str = "/v1internal:streamGenerateContent?alt=sse";
const LOAD_PATH: &str = "/v1internal:loadCodeAssist";

/// Gemini via the Code Assist endpoint, authenticated with OAuth
///
/// Requests are wrapped with the account's Cloud project, taken from
/// configuration or discovered once through `loadCodeAssist`.
#[derive(Debug)]
pub struct CodeAssistTransport {
    runtime: Arc<ProviderRuntime>,
    descriptor: TransportDescriptor,
    model: String,
    token: Option<AccessToken>,
}

impl CodeAssistTransport {
    pub fn new(runtime: Arc<ProviderRuntime>, model: &str) -> Self {
        let descriptor = TransportDescriptor {
            name: runtime.name().to_owned(),
            display_name: runtime.display_name().to_owned(),
            stream_format: StreamFormat::GeminiSse,
        };
        Self {
            runtime,
            descriptor,
            model: model.strip_prefix("google/").unwrap_or(model).to_owned(),
            token: None,
        }
    }

    pub(super) fn runtime(&self) -> &ProviderRuntime {
        &self.runtime
    }

    fn base_url(&self) -> &str {
        self.runtime
            .config()
            .base_url
            .as_ref()
            .map_or(DEFAULT_BASE_URL, url::Url::as_str)
    }

    fn project(&self) -> Option<&str> {
        self.runtime
            .config()
            .project_id
            .as_deref()
            .or_else(|| self.runtime.project().get().map(String::as_str))
    }

    /// Resolve the account's project once per provider
    async fn ensure_project(&self, token: &AccessToken) -> Result<(), LlmError> {
        if self.project().is_some() {
            return Ok(());
        }

        self.runtime
            .project()
            .get_or_try_init(|| self.discover_project(token))
            .await?;
        Ok(())
    }

    async fn discover_project(&self, token: &AccessToken) -> Result<String, LlmError> {
        let name = self.runtime.name();
        let mut headers = json_headers();
        headers.insert(http::header::AUTHORIZATION, bearer(name, token.secret())?);

        let body = json!({
            "metadata": {
                "ideType": "IDE_UNSPECIFIED",
                "platform": "PLATFORM_UNSPECIFIED",
                "pluginType": "GEMINI",
            }
        });

        let request = self
            .runtime
            .client()
            .post(join_url(self.base_url(), LOAD_PATH))
            .headers(headers)
            .json(&body)
            .timeout(OAUTH_REQUEST_TIMEOUT);

        let response = request.send().await.map_err(|e| LlmError::transport(name, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Upstream {
                provider: name.to_owned(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let loaded: LoadCodeAssistResponse = response.json().await.map_err(|e| LlmError::transport(name, &e))?;
        let project = loaded
            .cloudaicompanion_project
            .map(crate::protocol::google::CompanionProject::into_id)
            .ok_or_else(|| LlmError::configuration(name, "account has no Code Assist project; set project_id"))?;

        tracing::info!(provider = %name, project = %project, "discovered code assist project");
        Ok(project)
    }
}

#[async_trait]
impl ProviderTransport for CodeAssistTransport {
    fn descriptor(&self) -> &TransportDescriptor {
        &self.descriptor
    }

    fn adapter(&self) -> Adapter {
        Adapter::Gemini(GeminiAdapter::new())
    }

    fn endpoint(&self) -> Result<String, LlmError> {
        Ok(join_url(self.base_url(), STREAM_PATH))
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
        let ProviderPayload::Gemini(inner) = payload else {
            return Ok(payload);
        };
        let project = self
            .project()
            .ok_or_else(|| LlmError::configuration(self.runtime.name(), "project is not known yet"))?;

        Ok(ProviderPayload::CodeAssist(CodeAssistEnvelope {
            model: self.model.clone(),
            project: project.to_owned(),
            user_prompt_id: uuid::Uuid::new_v4().to_string(),
            request: inner.request,
        }))
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

        self.ensure_project(&token).await?;
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
