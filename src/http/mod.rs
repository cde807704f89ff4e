//! Caller-facing edge of the service: request errors and the
//! session extractor.
pub mod error;
mod session;

pub use self::error::{Error, Result};
