use std::path::Path;

use anyhow::{Context, bail};
use secrecy::ExposeSecret;

use crate::{Config, ProviderConfig, ProviderKind, QueueConfig};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a placeholder cannot be
    /// resolved, the TOML is malformed, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`], minus file access
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).context("failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending provider setting
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            bail!("at least one provider must be configured");
        }

        for (name, provider) in &self.providers {
            validate_provider(name, provider)?;
        }

        Ok(())
    }
}

fn validate_provider(name: &str, provider: &ProviderConfig) -> anyhow::Result<()> {
    validate_queue(name, &provider.queue)?;

    if let Some(ref timeout) = provider.stream_idle_timeout {
        check_duration(name, "stream_idle_timeout", timeout)?;
    }

    match provider.kind {
        ProviderKind::AnthropicCompatible | ProviderKind::Litellm if provider.base_url.is_none() => {
            bail!("provider '{name}' requires base_url");
        }
        ProviderKind::Vertex if provider.project_id.as_deref().is_none_or(str::is_empty) => {
            bail!("provider '{name}' requires project_id");
        }
        _ => {}
    }

    if provider.kind.uses_oauth() {
        let Some(ref oauth) = provider.oauth else {
            bail!("provider '{name}' requires an [oauth] section");
        };

        let has_refresh = oauth.refresh_token.as_ref().is_some_and(|t| !t.expose_secret().is_empty());
        let has_access = oauth.access_token.as_ref().is_some_and(|t| !t.expose_secret().is_empty());

        if !has_refresh && !has_access {
            bail!("provider '{name}' oauth needs refresh_token or access_token");
        }
        if has_refresh && oauth.client_id.is_none() {
            bail!("provider '{name}' oauth refresh_token requires client_id");
        }
    }

    Ok(())
}

fn validate_queue(name: &str, queue: &QueueConfig) -> anyhow::Result<()> {
    if queue.max_concurrent == 0 {
        bail!("provider '{name}' queue.max_concurrent must be greater than 0");
    }

    if let Some(ref rate) = queue.rate_limit {
        if rate.requests == 0 {
            bail!("provider '{name}' queue.rate_limit.requests must be greater than 0");
        }
        check_duration(name, "queue.rate_limit.window", &rate.window)?;
    }

    if let Some(ref timeout) = queue.queue_timeout {
        check_duration(name, "queue.queue_timeout", timeout)?;
    }

    Ok(())
}

fn check_duration(name: &str, field: &str, value: &str) -> anyhow::Result<()> {
    let parsed = duration_str::parse(value)
        .map_err(|e| anyhow::anyhow!("provider '{name}' has invalid {field} '{value}': {e}"))?;
    if parsed.is_zero() {
        bail!("provider '{name}' {field} must be non-zero");
    }
    Ok(())
}
