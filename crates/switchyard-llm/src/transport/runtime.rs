use std::sync::Arc;
use std::time::Duration;

use switchyard_auth::{AuthManager, LazyAuthManager, TokenSource, token_source};
use switchyard_config::ProviderConfig;
use switchyard_ratelimit::RequestQueue;
use tokio::sync::OnceCell;

use crate::error::LlmError;

/// Long-lived state shared by every request to one provider
///
/// Owns the provider's request queue, its auth manager and any discovered
/// account data. Transports are built per request on top of it.
pub struct ProviderRuntime {
    name: String,
    config: ProviderConfig,
    client: reqwest::Client,
    queue: RequestQueue,
    auth: Option<LazyAuthManager>,
    project: OnceCell<String>,
    idle_timeout: Option<Duration>,
}

impl std::fmt::Debug for ProviderRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRuntime")
            .field("name", &self.name)
            .field("kind", &self.config.kind)
            .field("queue", &self.queue.name())
            .finish_non_exhaustive()
    }
}

impl ProviderRuntime {
    pub fn new(name: impl Into<String>, config: ProviderConfig, client: reqwest::Client) -> Result<Self, LlmError> {
        let name = name.into();

        let queue = RequestQueue::from_config(name.clone(), &config.queue)
            .map_err(|e| LlmError::configuration(&name, e.to_string()))?;

        let idle_timeout = config
            .stream_idle_timeout
            .as_deref()
            .map(duration_str::parse)
            .transpose()
            .map_err(|e| LlmError::configuration(&name, format!("invalid stream_idle_timeout: {e}")))?;

        let auth = config.kind.uses_oauth().then(|| {
            let name = name.clone();
            let oauth = config.oauth.clone();
            let client = client.clone();
            LazyAuthManager::new(move || {
                let oauth = oauth
                    .as_ref()
                    .ok_or_else(|| switchyard_auth::AuthError::MissingCredentials(name.clone()))?;
                let source = token_source(&name, oauth, client.clone())?;
                tracing::debug!(provider = %name, "initialised auth manager");
                Ok(AuthManager::new(name.clone(), source))
            })
        });

        Ok(Self {
            name,
            config,
            client,
            queue,
            auth,
            project: OnceCell::new(),
            idle_timeout,
        })
    }

    /// Replace credential acquisition with `source`
    #[must_use]
    pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.auth = Some(LazyAuthManager::ready(AuthManager::new(self.name.clone(), source)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub const fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// Human-readable provider name
    pub fn display_name(&self) -> &str {
        self.config.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Auth manager for OAuth-backed providers, built on first use
    pub async fn auth(&self) -> Result<&AuthManager, LlmError> {
        let Some(lazy) = &self.auth else {
            return Err(LlmError::configuration(&self.name, "provider has no OAuth credentials"));
        };
        lazy.get().await.map_err(|e| LlmError::auth(&self.name, &e))
    }

    /// Project id discovered for this account, cached after the first lookup
    pub const fn project(&self) -> &OnceCell<String> {
        &self.project
    }

    pub const fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }
}
