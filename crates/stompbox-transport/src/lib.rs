//! Stompbox Transport
//!
//! Byte-stream transport seams for the broker and a WebSocket
//! implementation of them.
//!
//! The broker consumes connections only through the traits in [`traits`]:
//! a sender with open/closed state, send, ping, and close operations, and
//! a receiver yielding [`TransportEvent`]s. [`WebSocketServer`] accepts
//! client connections; [`WebSocketTransport`] is the client side, used by
//! host code and tests.

pub mod error;
pub mod traits;
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{Transport, TransportEvent, TransportReceiver, TransportSender, TransportServer};
pub use websocket::{
    WebSocketConfig, WebSocketReceiver, WebSocketSender, WebSocketServer, WebSocketTransport,
};
