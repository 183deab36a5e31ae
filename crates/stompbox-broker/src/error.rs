//! Broker error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors surfaced by the broker's serving API. Per-frame protocol
/// mistakes never appear here: those are answered with ERROR frames on
/// the offending connection.
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("transport error: {0}")]
    Transport(#[from] stompbox_transport::TransportError),
}
