use thiserror::Error;

/// Credential acquisition errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable credentials are configured
    #[error("missing credentials for '{0}'")]
    MissingCredentials(String),

    /// The token endpoint rejected the refresh
    #[error("token refresh rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status returned by the token endpoint
        status: u16,
        /// Response body
        body: String,
    },

    /// The token endpoint could not be reached
    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    /// The token endpoint answered with something unusable
    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}
