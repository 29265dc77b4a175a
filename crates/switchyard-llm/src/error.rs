use http::StatusCode;
use switchyard_auth::AuthError;
use switchyard_core::HttpError;
use switchyard_ratelimit::QueueError;
use thiserror::Error;

/// Errors that can occur while serving a request
#[derive(Debug, Error)]
pub enum LlmError {
    /// Named provider does not exist in configuration
    #[error("provider not found: {provider}")]
    ProviderNotFound { provider: String },

    /// No configured provider accepts the model
    #[error("no provider configured for model: {model}")]
    ModelNotFound { model: String },

    /// The transport cannot be built from its configuration
    #[error("provider '{provider}' is misconfigured: {message}")]
    Configuration { provider: String, message: String },

    /// Credentials were rejected or could not be obtained
    #[error("authentication with '{provider}' failed: {message}")]
    AuthFailure { provider: String, message: String },

    /// Upstream provider answered with a non-success status
    #[error("provider '{provider}' returned {status}: {body}")]
    Upstream { provider: String, status: u16, body: String },

    /// Upstream did not answer in time
    #[error("request to '{provider}' timed out")]
    Timeout { provider: String },

    /// Upstream could not be reached
    #[error("request to '{provider}' failed: {message}")]
    Transport { provider: String, message: String },

    /// The provider's request queue refused admission
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Client sent a malformed or invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    pub(crate) fn configuration(provider: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            provider: provider.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn auth(provider: &str, error: &AuthError) -> Self {
        Self::AuthFailure {
            provider: provider.to_owned(),
            message: error.to_string(),
        }
    }

    pub(crate) fn transport(provider: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                provider: provider.to_owned(),
            }
        } else {
            Self::Transport {
                provider: provider.to_owned(),
                message: error.to_string(),
            }
        }
    }
}

impl HttpError for LlmError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ProviderNotFound { .. } | Self::ModelNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::AuthFailure { .. } => StatusCode::UNAUTHORIZED,
            Self::Upstream { status, .. } => match StatusCode::from_u16(*status) {
                Ok(code @ (StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE | StatusCode::TOO_MANY_REQUESTS)) => {
                    code
                }
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Transport { .. } => StatusCode::BAD_GATEWAY,
            Self::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::ProviderNotFound { .. } | Self::ModelNotFound { .. } => "not_found_error",
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::AuthFailure { .. } => "authentication_error",
            Self::Upstream { status: 429, .. } => "rate_limit_error",
            Self::Upstream { status: 400 | 413, .. } => "invalid_request_error",
            Self::Queue(_) => "overloaded_error",
            Self::Upstream { .. }
            | Self::Timeout { .. }
            | Self::Transport { .. }
            | Self::Configuration { .. }
            | Self::Internal(_) => "api_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}
