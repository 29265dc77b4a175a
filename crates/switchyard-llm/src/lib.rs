//! Protocol translation core for switchyard
//!
//! Accepts requests in the Anthropic Messages format, shapes them for the
//! configured upstream provider, and translates the upstream stream back
//! into canonical Anthropic SSE.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod adapter;
pub mod error;
pub mod gateway;
pub mod protocol;
#[cfg(feature = "http")]
pub mod router;
pub mod stream;
pub mod transport;
pub mod types;

pub use adapter::{Adapter, ModelAdapter};
pub use error::LlmError;
pub use gateway::{Gateway, MessageStream};
#[cfg(feature = "http")]
pub use router::{PROVIDER_HEADER, llm_router};
pub use stream::{StreamFormat, StreamParser};
pub use transport::{ProviderRuntime, ProviderTransport, Transport};
pub use types::{MessagesRequest, TokenUsage};
