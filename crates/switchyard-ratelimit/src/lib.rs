#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

mod error;
mod queue;

pub use error::QueueError;
pub use queue::{QueueTicket, RequestQueue};
