//! Stompbox Core
//!
//! Core types and wire codec for the Stompbox STOMP 1.2 broker.
//!
//! This crate provides:
//! - The protocol command set ([`Command`])
//! - The frame value type ([`Frame`])
//! - Text wire-format parsing and serialization ([`codec`])
//! - A typed view of inbound client frames ([`Request`])

pub mod codec;
pub mod command;
pub mod error;
pub mod frame;
pub mod request;

pub use codec::{parse, serialize};
pub use command::Command;
pub use error::{Error, Result};
pub use frame::Frame;
pub use request::Request;

/// STOMP protocol version spoken by the broker
pub const STOMP_VERSION: &str = "1.2";

/// Default broker port
pub const DEFAULT_PORT: u16 = 61613;

/// WebSocket subprotocol identifier
pub const WS_SUBPROTOCOL: &str = "v12.stomp";

/// Line-feed octet separating frame lines
pub const LF: u8 = 0x0A;

/// NUL octet terminating a frame
pub const NUL: u8 = 0x00;

/// The heartbeat probe: a single line-feed, no headers, no terminator
pub const HEARTBEAT: &[u8] = &[LF];
