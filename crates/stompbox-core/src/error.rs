//! Error types for the core protocol crate

use thiserror::Error;

/// Result type alias for core protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol error types
///
/// Every variant is recoverable at the connection level: the broker replies
/// with an ERROR frame and keeps the connection open.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Frame bytes could not be tokenized
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Command token outside the STOMP command set; carries the raw token
    #[error("unsupported command: {0}")]
    UnknownCommand(String),

    /// SUBSCRIBE frame without an `id` or `destination` header
    #[error("missing subscription headers")]
    MissingSubscriptionHeaders,
}
