//! OAuth credential ownership and refresh coordination
//!
//! An [`AuthManager`] owns the cached access token for one credential
//! domain. Token acquisition is delegated to a [`TokenSource`].

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

mod error;
mod manager;
mod source;

pub use error::AuthError;
pub use manager::{AccessToken, AuthManager, LazyAuthManager};
pub use source::{GOOGLE_TOKEN_URL, IssuedToken, RefreshTokenSource, StaticTokenSource, TokenSource, token_source};
