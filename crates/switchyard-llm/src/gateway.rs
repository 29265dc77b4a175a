//! Request orchestration across configured providers

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use indexmap::IndexMap;
use serde_json::Value;
use switchyard_config::ProviderConfig;

use crate::error::LlmError;
use crate::stream::StreamParser;
use crate::transport::{ProviderRuntime, ProviderTransport, Transport};
use crate::types::{MessagesRequest, TokenUsage};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Canonical SSE frames for one response
pub type MessageStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

/// Routes canonical requests to providers and streams canonical SSE back
#[derive(Debug)]
pub struct Gateway {
    providers: IndexMap<String, Arc<ProviderRuntime>>,
}

impl Gateway {
    /// Build runtimes for every configured provider, sharing one HTTP client
    pub fn new(providers: IndexMap<String, ProviderConfig>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

        let runtimes = providers
            .into_iter()
            .map(|(name, config)| ProviderRuntime::new(name, config, client.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_runtimes(runtimes))
    }

    /// Gateway over already constructed runtimes, in the given order
    pub fn from_runtimes(runtimes: impl IntoIterator<Item = ProviderRuntime>) -> Self {
        let providers = runtimes
            .into_iter()
            .map(|runtime| (runtime.name().to_owned(), Arc::new(runtime)))
            .collect();
        Self { providers }
    }

    /// Configured provider names, in configuration order
    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Pick the provider for a request
    ///
    /// An explicit name wins. Otherwise the first provider listing `model`
    /// in its configured models, then the first whose adapter claims the
    /// model. A gateway with a single provider always uses it.
    pub fn select(&self, provider: Option<&str>, model: &str) -> Result<&Arc<ProviderRuntime>, LlmError> {
        if let Some(name) = provider {
            return self.providers.get(name).ok_or_else(|| LlmError::ProviderNotFound {
                provider: name.to_owned(),
            });
        }

        if let Some(runtime) = self
            .providers
            .values()
            .find(|r| r.config().models.iter().any(|m| m == model))
        {
            return Ok(runtime);
        }

        let claimed = self.providers.values().find(|r| {
            Transport::for_model(Arc::clone(r), model).is_ok_and(|t| t.adapter().should_handle(model))
        });
        if let Some(runtime) = claimed {
            return Ok(runtime);
        }

        if self.providers.len() == 1
            && let Some(runtime) = self.providers.values().next()
        {
            return Ok(runtime);
        }

        Err(LlmError::ModelNotFound {
            model: model.to_owned(),
        })
    }

    /// Stream a response, logging final usage when it completes
    pub async fn stream(&self, request: MessagesRequest, provider: Option<&str>) -> Result<MessageStream, LlmError> {
        self.stream_with_usage(request, provider, |_| {}).await
    }

    /// Stream a response; `on_usage` receives the final token counts once
    pub async fn stream_with_usage(
        &self,
        request: MessagesRequest,
        provider: Option<&str>,
        on_usage: impl FnOnce(TokenUsage) + Send + 'static,
    ) -> Result<MessageStream, LlmError> {
        validate(&request)?;

        let runtime = Arc::clone(self.select(provider, &request.model)?);
        let mut transport = Transport::for_model(Arc::clone(&runtime), &request.model)?;
        let adapter = transport.adapter();
        let provider_name = runtime.name().to_owned();

        tracing::debug!(
            provider = %provider_name,
            model = %request.model,
            format = %transport.descriptor().stream_format,
            "routing request"
        );

        let payload = adapter.prepare(&request, None, false);
        transport.refresh_auth().await?;
        let payload = transport.transform_payload(payload)?;

        let mut body = serde_json::to_value(&payload)
            .map_err(|e| LlmError::Internal(anyhow::anyhow!("failed to serialize {} payload: {e}", payload.kind())))?;
        if let Value::Object(fields) = &mut body {
            fields.extend(transport.extra_payload_fields());
        }

        let response = transport.send(&body).await?;

        let model = request.model.clone();
        let usage_provider = provider_name.clone();
        let parser = StreamParser::new(transport.descriptor().stream_format, adapter, &request.model).on_usage(
            move |usage| {
                tracing::info!(
                    provider = %usage_provider,
                    model = %model,
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "request completed"
                );
                on_usage(usage);
            },
        );

        Ok(Box::pin(parser.into_stream(
            response.bytes_stream(),
            runtime.idle_timeout(),
            provider_name,
        )))
    }
}

fn validate(request: &MessagesRequest) -> Result<(), LlmError> {
    if request.model.trim().is_empty() {
        return Err(LlmError::InvalidRequest("model must not be empty".to_owned()));
    }
    if request.messages.is_empty() {
        return Err(LlmError::InvalidRequest("messages must not be empty".to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use switchyard_config::ProviderKind;

    use super::*;
    use crate::types::{Message, Role};

    fn runtime(name: &str, kind: ProviderKind, models: &[&str]) -> ProviderRuntime {
        let mut config = ProviderConfig::new(kind);
        config.models = models.iter().map(|m| (*m).to_owned()).collect();
        ProviderRuntime::new(name, config, reqwest::Client::new()).unwrap()
    }

    fn gateway() -> Gateway {
        Gateway::from_runtimes([
            runtime("zai", ProviderKind::AnthropicCompatible, &["glm-4.6"]),
            runtime("openai", ProviderKind::Openai, &[]),
            runtime("gemini", ProviderKind::GeminiCodeAssist, &[]),
        ])
    }

    #[test]
    fn explicit_provider_wins() {
        let gateway = gateway();
        assert_eq!(gateway.select(Some("openai"), "glm-4.6").unwrap().name(), "openai");
        assert!(matches!(
            gateway.select(Some("missing"), "glm-4.6"),
            Err(LlmError::ProviderNotFound { .. })
        ));
    }

    #[test]
    fn configured_models_then_adapter_claims() {
        let gateway = gateway();
        assert_eq!(gateway.select(None, "glm-4.6").unwrap().name(), "zai");
        assert_eq!(gateway.select(None, "gpt-4o").unwrap().name(), "openai");
        assert_eq!(gateway.select(None, "gemini-2.5-pro").unwrap().name(), "gemini");
        assert!(matches!(
            gateway.select(None, "mystery-1"),
            Err(LlmError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn single_provider_takes_everything() {
        let gateway = Gateway::from_runtimes([runtime("only", ProviderKind::Anthropic, &[])]);
        assert_eq!(gateway.select(None, "anything").unwrap().name(), "only");
        assert_eq!(gateway.provider_names().collect::<Vec<_>>(), vec!["only"]);
    }

    #[tokio::test]
    async fn rejects_empty_messages() {
        let gateway = gateway();
        let request = MessagesRequest::new("gpt-4o", Vec::new());
        assert!(matches!(
            gateway.stream(request, None).await,
            Err(LlmError::InvalidRequest(_))
        ));

        let request = MessagesRequest::new("", vec![Message::text(Role::User, "hi")]);
        assert!(matches!(
            gateway.stream(request, None).await,
            Err(LlmError::InvalidRequest(_))
        ));
    }
}
