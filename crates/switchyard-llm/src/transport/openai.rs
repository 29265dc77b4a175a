use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderMap, HeaderName};
use serde_json::{Map, Value};
use switchyard_config::ProviderKind;
use switchyard_ratelimit::RequestQueue;

use super::{ProviderRuntime, ProviderTransport, TransportDescriptor, bearer, header_value, join_url, json_headers};
use crate::adapter::{Adapter, OpenAiAdapter};
use crate::error::LlmError;
use crate::stream::StreamFormat;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_REFERER: &str = "https://github.com/switchyard-gateway/switchyard";
const DEFAULT_TITLE: &str = "switchyard";

/// Headers some models behind LiteLLM require, by model name fragment
///
/// Matching is case-insensitive; headers from every matching rule are merged.
const LITELLM_HEADER_RULES: &[(&str, &[(&str, &str)])] = &[("kimi", &[("User-Agent", "claude-code/1.0")])];

fn descriptor(runtime: &ProviderRuntime) -> TransportDescriptor {
    TransportDescriptor {
        name: runtime.name().to_owned(),
        display_name: runtime.display_name().to_owned(),
        stream_format: StreamFormat::OpenAiSse,
    }
}

/// OpenAI Chat Completions, directly or through OpenRouter
#[derive(Debug)]
pub struct OpenAiTransport {
    runtime: Arc<ProviderRuntime>,
    descriptor: TransportDescriptor,
    model: String,
}

impl OpenAiTransport {
    pub fn new(runtime: Arc<ProviderRuntime>, model: &str) -> Self {
        Self {
            descriptor: descriptor(&runtime),
            runtime,
            model: model.to_owned(),
        }
    }

    pub(super) fn runtime(&self) -> &ProviderRuntime {
        &self.runtime
    }

    fn is_openrouter(&self) -> bool {
        self.runtime.config().kind == ProviderKind::Openrouter
    }
}

#[async_trait]
impl ProviderTransport for OpenAiTransport {
    fn descriptor(&self) -> &TransportDescriptor {
        &self.descriptor
    }

    fn adapter(&self) -> Adapter {
        Adapter::OpenAi(OpenAiAdapter::new(self.model.as_str()))
    }

    fn endpoint(&self) -> Result<String, LlmError> {
        let default = if self.is_openrouter() { OPENROUTER_BASE_URL } else { OPENAI_BASE_URL };
        let base = self.runtime.config().base_url.as_ref().map_or(default, url::Url::as_str);
        Ok(join_url(base, "/chat/completions"))
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let name = self.runtime.name();
        let config = self.runtime.config();
        let key = config
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::configuration(name, "api_key is required"))?;

        let mut headers = json_headers();
        headers.insert(http::header::AUTHORIZATION, bearer(name, key)?);

        if self.is_openrouter() {
            let referer = config.referer.as_deref().unwrap_or(DEFAULT_REFERER);
            let title = config.title.as_deref().unwrap_or(DEFAULT_TITLE);
            headers.insert(HeaderName::from_static("http-referer"), header_value(name, referer)?);
            headers.insert(HeaderName::from_static("x-title"), header_value(name, title)?);
        }

        Ok(headers)
    }

    fn queue(&self) -> &RequestQueue {
        self.runtime.queue()
    }
}

/// OpenAI-shaped requests to a LiteLLM proxy
///
/// `base_url` is the proxy root; the key is optional.
#[derive(Debug)]
pub struct LiteLlmTransport {
    runtime: Arc<ProviderRuntime>,
    descriptor: TransportDescriptor,
    model: String,
}

impl LiteLlmTransport {
    pub fn new(runtime: Arc<ProviderRuntime>, model: &str) -> Self {
        Self {
            descriptor: descriptor(&runtime),
            runtime,
            model: model.to_owned(),
        }
    }

    pub(super) fn runtime(&self) -> &ProviderRuntime {
        &self.runtime
    }
}

#[async_trait]
impl ProviderTransport for LiteLlmTransport {
    fn descriptor(&self) -> &TransportDescriptor {
        &self.descriptor
    }

    fn adapter(&self) -> Adapter {
        Adapter::OpenAi(OpenAiAdapter::new(self.model.as_str()))
    }

    fn endpoint(&self) -> Result<String, LlmError> {
        let base = self
            .runtime
            .config()
            .base_url
            .as_ref()
            .ok_or_else(|| LlmError::configuration(self.runtime.name(), "base_url is required"))?;
        Ok(join_url(base.as_str(), "/v1/chat/completions"))
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = json_headers();
        if let Some(key) = &self.runtime.config().api_key {
            headers.insert(http::header::AUTHORIZATION, bearer(self.runtime.name(), key)?);
        }
        Ok(headers)
    }

    fn extra_payload_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        let extra = litellm_extra_headers(&self.model);
        if !extra.is_empty() {
            fields.insert("extra_headers".to_owned(), Value::Object(extra));
        }
        fields
    }

    fn queue(&self) -> &RequestQueue {
        self.runtime.queue()
    }
}

/// Headers LiteLLM should forward upstream for `model`
pub fn litellm_extra_headers(model: &str) -> Map<String, Value> {
    let model = model.to_lowercase();
    LITELLM_HEADER_RULES
        .iter()
        .filter(|(pattern, _)| model.contains(pattern))
        .flat_map(|(_, headers)| headers.iter())
        .map(|(name, value)| ((*name).to_owned(), Value::String((*value).to_owned())))
        .collect()
}
