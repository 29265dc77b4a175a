use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::QueueConfig;

/// Configuration for a single upstream provider
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Wire protocol family spoken by the provider
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    /// Human-readable name used in logs
    #[serde(default)]
    pub display_name: Option<String>,
    /// Static API key
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Model names routed to this provider
    #[serde(default)]
    pub models: Vec<String>,
    /// Concurrency and pacing for outbound calls
    #[serde(default)]
    pub queue: QueueConfig,
    /// OAuth credentials for Google-backed providers
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
    /// Google Cloud project (Vertex, Code Assist)
    #[serde(default)]
    pub project_id: Option<String>,
    /// Google Cloud region (Vertex)
    #[serde(default)]
    pub region: Option<String>,
    /// Maximum silence between stream chunks before the stream is ended (e.g. "120s")
    #[serde(default)]
    pub stream_idle_timeout: Option<String>,
    /// `HTTP-Referer` attribution (OpenRouter)
    #[serde(default)]
    pub referer: Option<String>,
    /// `X-Title` attribution (OpenRouter)
    #[serde(default)]
    pub title: Option<String>,
}

impl ProviderConfig {
    /// Minimal configuration for a provider kind, everything else defaulted
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            display_name: None,
            api_key: None,
            base_url: None,
            models: Vec::new(),
            queue: QueueConfig::default(),
            oauth: None,
            project_id: None,
            region: None,
            stream_idle_timeout: None,
            referer: None,
            title: None,
        }
    }
}

/// Supported provider protocol families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Anthropic Messages API
    Anthropic,
    /// Third-party endpoint speaking the Anthropic Messages API
    AnthropicCompatible,
    /// OpenAI Chat Completions API
    Openai,
    /// OpenRouter (OpenAI-compatible with attribution headers)
    Openrouter,
    /// LiteLLM proxy (OpenAI-compatible)
    Litellm,
    /// Google Gemini via the Code Assist endpoint
    GeminiCodeAssist,
    /// Google Vertex AI (Gemini and partner publishers)
    Vertex,
}

impl ProviderKind {
    /// Whether the provider authenticates with OAuth bearer tokens
    pub const fn uses_oauth(self) -> bool {
        matches!(self, Self::GeminiCodeAssist | Self::Vertex)
    }
}

/// OAuth credentials
///
/// Either a long-lived `refresh_token` (exchanged at `token_url`) or a
/// pre-issued `access_token` must be present.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OAuthConfig {
    /// OAuth client identifier
    #[serde(default)]
    pub client_id: Option<String>,
    /// OAuth client secret
    #[serde(default)]
    pub client_secret: Option<SecretString>,
    /// Refresh token used to mint access tokens
    #[serde(default)]
    pub refresh_token: Option<SecretString>,
    /// Pre-issued access token, used verbatim
    #[serde(default)]
    pub access_token: Option<SecretString>,
    /// Token endpoint override
    #[serde(default)]
    pub token_url: Option<Url>,
}
