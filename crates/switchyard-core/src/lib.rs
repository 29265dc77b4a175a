//! Shared primitives for the switchyard crates

mod error;

pub use error::HttpError;
