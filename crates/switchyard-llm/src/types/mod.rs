//! Canonical (Anthropic Messages) request types shared by every adapter

mod adapter;
mod message;
mod request;
mod tool;
mod usage;

pub use adapter::*;
pub use message::*;
pub use request::*;
pub use tool::*;
pub use usage::*;
