use thiserror::Error;

mod auth;
mod database;
mod logging;
mod server;

pub use self::auth::{Auth, Password};
pub use self::database::Database;
pub use self::logging::{InvalidLoggingStyle, Logging, LoggingStyle};
pub use self::server::{Server, Storage};

#[derive(Debug, Error)]
#[error("Failed to load configuration")]
pub struct ParseError;
