//! Error types for the console client.

use thiserror::Error;

use crate::domain::{ApiError, ValueObjectError};

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Command recognized but its arguments are wrong
    #[error("Usage: {0}")]
    InvalidCommand(&'static str),

    #[error("Unknown command '{0}' (type /help)")]
    UnknownCommand(String),

    #[error(transparent)]
    InvalidValue(#[from] ValueObjectError),

    #[error("Notification request failed: {0}")]
    Api(#[from] ApiError),

    #[error("Readline error: {0}")]
    Readline(String),
}
