use serde::Deserialize;

/// Admission control for outbound calls to one provider
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum number of concurrently in-flight upstream calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Optional pacing of admissions (requests per window)
    #[serde(default)]
    pub rate_limit: Option<QueueRateLimit>,
    /// How long a call may wait for a slot (e.g. "30s")
    #[serde(default)]
    pub queue_timeout: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            rate_limit: None,
            queue_timeout: None,
        }
    }
}

/// Requests-per-window pacing for a queue
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueRateLimit {
    /// Maximum admissions per window
    pub requests: u32,
    /// Window duration (e.g. "1m", "10s")
    pub window: String,
}

const fn default_max_concurrent() -> usize {
    8
}
