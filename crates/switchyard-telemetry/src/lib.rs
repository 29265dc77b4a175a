//! Logging setup for switchyard
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a text
//! or JSON fmt layer.

use switchyard_config::{LogFormat, TelemetryConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging from configuration
///
/// `filter_override` (typically from the command line) takes precedence
/// over the configured filter. An unparsable filter falls back to `info`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init(config: Option<&TelemetryConfig>, filter_override: Option<&str>) -> anyhow::Result<()> {
    let defaults = TelemetryConfig::default();
    let config = config.unwrap_or(&defaults);

    let directive = filter_override.unwrap_or(&config.log_filter);
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}
