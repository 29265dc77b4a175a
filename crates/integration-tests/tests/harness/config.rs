//! Programmatic configuration builder for integration tests

use secrecy::SecretString;
use switchyard_config::{Config, OAuthConfig, ProviderConfig, ProviderKind};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// OpenAI provider pointed at a mock backend (`base_url` includes `/v1`)
    pub fn with_openai_provider(self, name: &str, base_url: &str) -> Self {
        let mut provider = ProviderConfig::new(ProviderKind::Openai);
        provider.api_key = Some(SecretString::from("test-key"));
        provider.base_url = Some(base_url.parse().expect("valid URL"));
        self.with_provider(name, provider)
    }

    /// LiteLLM provider pointed at a mock backend root
    pub fn with_litellm_provider(self, name: &str, base_url: &str) -> Self {
        let mut provider = ProviderConfig::new(ProviderKind::Litellm);
        provider.base_url = Some(base_url.parse().expect("valid URL"));
        self.with_provider(name, provider)
    }

    /// Anthropic provider pointed at a mock backend root
    pub fn with_anthropic_provider(self, name: &str, base_url: &str) -> Self {
        let mut provider = ProviderConfig::new(ProviderKind::Anthropic);
        provider.api_key = Some(SecretString::from("sk-ant-test"));
        provider.base_url = Some(base_url.parse().expect("valid URL"));
        self.with_provider(name, provider)
    }

    /// Gemini Code Assist provider refreshing tokens against the mock
    pub fn with_code_assist_provider(
        self,
        name: &str,
        base_url: &str,
        token_url: &str,
        project_id: Option<&str>,
    ) -> Self {
        let mut provider = ProviderConfig::new(ProviderKind::GeminiCodeAssist);
        provider.base_url = Some(base_url.parse().expect("valid URL"));
        provider.project_id = project_id.map(str::to_owned);
        provider.oauth = Some(OAuthConfig {
            client_id: Some("client-1".to_owned()),
            client_secret: Some(SecretString::from("client-secret")),
            refresh_token: Some(SecretString::from("refresh-1")),
            access_token: None,
            token_url: Some(token_url.parse().expect("valid URL")),
        });
        self.with_provider(name, provider)
    }

    pub fn with_provider(mut self, name: &str, provider: ProviderConfig) -> Self {
        self.config.providers.insert(name.to_owned(), provider);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
