use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue};
use secrecy::ExposeSecret;
use switchyard_config::ProviderKind;
use switchyard_ratelimit::RequestQueue;

use super::{ProviderRuntime, ProviderTransport, TransportDescriptor, bearer, header_value, join_url, json_headers};
use crate::adapter::{Adapter, PassthroughAdapter};
use crate::error::LlmError;
use crate::stream::StreamFormat;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API endpoint of Anthropic or an Anthropic-compatible vendor
///
/// Anthropic itself authenticates with `x-api-key`; compatible vendors
/// expect a bearer token.
#[derive(Debug)]
pub struct AnthropicTransport {
    runtime: Arc<ProviderRuntime>,
    descriptor: TransportDescriptor,
}

impl AnthropicTransport {
    pub fn new(runtime: Arc<ProviderRuntime>) -> Self {
        let descriptor = TransportDescriptor {
            name: runtime.name().to_owned(),
            display_name: runtime.display_name().to_owned(),
            stream_format: StreamFormat::AnthropicSse,
        };
        Self { runtime, descriptor }
    }

    pub(super) fn runtime(&self) -> &ProviderRuntime {
        &self.runtime
    }

    fn is_first_party(&self) -> bool {
        self.runtime.config().kind == ProviderKind::Anthropic
    }
}

#[async_trait]
impl ProviderTransport for AnthropicTransport {
    fn descriptor(&self) -> &TransportDescriptor {
        &self.descriptor
    }

    fn adapter(&self) -> Adapter {
        let vendor = if self.is_first_party() { "anthropic" } else { self.runtime.name() };
        Adapter::Passthrough(PassthroughAdapter::new(vendor))
    }

    fn endpoint(&self) -> Result<String, LlmError> {
        let base = self
            .runtime
            .config()
            .base_url
            .as_ref()
            .map_or(DEFAULT_BASE_URL, url::Url::as_str);
        Ok(join_url(base, "/v1/messages"))
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let name = self.runtime.name();
        let key = self
            .runtime
            .config()
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::configuration(name, "api_key is required"))?;

        let mut headers = json_headers();
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        if self.is_first_party() {
            let mut value = header_value(name, key.expose_secret())?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static("x-api-key"), value);
        } else {
            headers.insert(http::header::AUTHORIZATION, bearer(name, key)?);
        }

        Ok(headers)
    }

    fn queue(&self) -> &RequestQueue {
        self.runtime.queue()
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use switchyard_config::ProviderConfig;

    use super::*;

    fn transport(kind: ProviderKind, base: Option<&str>, key: Option<&str>) -> AnthropicTransport {
        let mut config = ProviderConfig::new(kind);
        config.base_url = base.map(|b| b.parse().unwrap());
        config.api_key = key.map(SecretString::from);
        let runtime = ProviderRuntime::new("zai", config, reqwest::Client::new()).unwrap();
        AnthropicTransport::new(Arc::new(runtime))
    }

    #[test]
    fn first_party_uses_api_key_header() {
        let transport = transport(ProviderKind::Anthropic, None, Some("sk-ant"));

        assert_eq!(transport.endpoint().unwrap(), "https://api.anthropic.com/v1/messages");
        let headers = transport.headers().unwrap();
        assert_eq!(headers["x-api-key"], "sk-ant");
        assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);
        assert!(headers.get("authorization").is_none());
    }

    #[test]
    fn compatible_vendor_uses_bearer() {
        let transport = transport(
            ProviderKind::AnthropicCompatible,
            Some("https://api.z.ai/api/anthropic"),
            Some("zk"),
        );

        assert_eq!(transport.endpoint().unwrap(), "https://api.z.ai/api/anthropic/v1/messages");
        let headers = transport.headers().unwrap();
        assert_eq!(headers["authorization"], "Bearer zk");
        assert!(headers.get("x-api-key").is_none());
        assert_eq!(transport.adapter().context_window(), 128_000);
    }

    #[test]
    fn missing_key_is_configuration_error() {
        let transport = transport(ProviderKind::Anthropic, None, None);
        assert!(matches!(transport.headers(), Err(LlmError::Configuration { .. })));
    }
}
