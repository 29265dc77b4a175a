use std::time::Duration;

use thiserror::Error;

/// Request queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// Configuration error
    #[error("queue configuration error: {0}")]
    Config(String),

    /// No slot became available within the admission timeout
    #[error("queue '{queue}' timed out after {waited:?} waiting for a slot")]
    Timeout {
        /// Queue name
        queue: String,
        /// How long the caller waited
        waited: Duration,
    },

    /// The queue no longer admits calls
    #[error("queue '{0}' is closed")]
    Closed(String),
}
