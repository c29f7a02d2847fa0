//! Domain error types.

use thiserror::Error;

/// Errors raised when constructing value objects from raw input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("unknown presence status '{0}'")]
    UnknownStatus(String),
}

/// Errors raised by the persistent connection transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Handshake or network failure; retried by the connection driver
    #[error("Connection error: {0}")]
    Connect(String),

    /// Handshake refused for authentication reasons; never retried
    #[error("Connection rejected: {0}")]
    Rejected(String),

    /// An established link was closed by the peer or the network
    #[error("Connection closed")]
    Closed,
}

/// Errors raised by the notification REST collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Request error: {0}")]
    Request(String),
}

impl ApiError {
    /// Whether the backend is known to be unreachable, in which case callers
    /// degrade to an empty state instead of reporting the failure.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
