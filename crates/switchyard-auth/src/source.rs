use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use switchyard_config::OAuthConfig;
use url::Url;

use crate::AuthError;

/// Default OAuth2 token endpoint for Google credentials
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// A freshly issued access token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Bearer token
    pub access_token: SecretString,
    /// Lifetime reported by the issuer, if any
    pub expires_in: Option<Duration>,
}

/// Something that can mint access tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain a new access token
    async fn fetch_token(&self) -> Result<IssuedToken, AuthError>;
}

/// Hands out one pre-issued token
pub struct StaticTokenSource {
    token: SecretString,
}

impl StaticTokenSource {
    pub const fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch_token(&self) -> Result<IssuedToken, AuthError> {
        Ok(IssuedToken {
            access_token: self.token.clone(),
            expires_in: None,
        })
    }
}

/// OAuth2 `refresh_token` grant against a token endpoint
pub struct RefreshTokenSource {
    client: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: Option<SecretString>,
    refresh_token: SecretString,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl RefreshTokenSource {
    pub const fn new(
        client: reqwest::Client,
        token_url: Url,
        client_id: String,
        client_secret: Option<SecretString>,
        refresh_token: SecretString,
    ) -> Self {
        Self {
            client,
            token_url,
            client_id,
            client_secret,
            refresh_token,
        }
    }
}

#[async_trait]
impl TokenSource for RefreshTokenSource {
    async fn fetch_token(&self) -> Result<IssuedToken, AuthError> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.expose_secret()),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(ref secret) = self.client_secret {
            form.push(("client_secret", secret.expose_secret()));
        }

        let response = self
            .client
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        if token.access_token.is_empty() {
            return Err(AuthError::InvalidResponse("empty access_token".to_owned()));
        }

        Ok(IssuedToken {
            access_token: SecretString::from(token.access_token),
            expires_in: token.expires_in.map(Duration::from_secs),
        })
    }
}

/// Build the token source described by an `[oauth]` block
///
/// A pre-issued `access_token` wins over a `refresh_token`.
pub fn token_source(
    name: &str,
    config: &OAuthConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn TokenSource>, AuthError> {
    if let Some(ref token) = config.access_token {
        return Ok(Arc::new(StaticTokenSource::new(token.clone())));
    }

    let (Some(refresh_token), Some(client_id)) = (config.refresh_token.clone(), config.client_id.clone()) else {
        return Err(AuthError::MissingCredentials(name.to_owned()));
    };

    let token_url = match config.token_url {
        Some(ref url) => url.clone(),
        None => Url::parse(GOOGLE_TOKEN_URL).map_err(|e| AuthError::InvalidResponse(e.to_string()))?,
    };

    Ok(Arc::new(RefreshTokenSource::new(
        client,
        token_url,
        client_id,
        config.client_secret.clone(),
        refresh_token,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth(refresh: Option<&str>, access: Option<&str>, client_id: Option<&str>) -> OAuthConfig {
        OAuthConfig {
            client_id: client_id.map(str::to_owned),
            client_secret: None,
            refresh_token: refresh.map(SecretString::from),
            access_token: access.map(SecretString::from),
            token_url: None,
        }
    }

    #[tokio::test]
    async fn static_source_returns_configured_token() {
        let source = token_source("v", &oauth(None, Some("ya29.static"), None), reqwest::Client::new()).unwrap();
        let token = source.fetch_token().await.unwrap();
        assert_eq!(token.access_token.expose_secret(), "ya29.static");
        assert!(token.expires_in.is_none());
    }

    #[test]
    fn refresh_source_requires_client_id() {
        let err = token_source("v", &oauth(Some("rt"), None, None), reqwest::Client::new())
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::MissingCredentials(name) if name == "v"));
    }

    #[test]
    fn refresh_source_built_from_refresh_token() {
        assert!(token_source("v", &oauth(Some("rt"), None, Some("cid")), reqwest::Client::new()).is_ok());
    }
}
