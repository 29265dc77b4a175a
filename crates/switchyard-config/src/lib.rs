#![allow(clippy::must_use_candidate)]

mod env;
mod loader;
pub mod provider;
pub mod queue;
pub mod server;
pub mod telemetry;

use indexmap::IndexMap;
use serde::Deserialize;

pub use provider::*;
pub use queue::*;
pub use server::*;
pub use telemetry::*;

/// Top-level switchyard configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP listener configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream providers keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Logging configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
