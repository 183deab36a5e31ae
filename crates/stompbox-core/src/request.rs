//! Typed view of inbound client frames
//!
//! Classification happens once per frame, right after parsing; per-command
//! header validation lives here instead of inside each broker handler.

use crate::{Command, Error, Frame, Result};

/// An inbound client frame classified by command, carrying only the headers
/// that command cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Heartbeat probe
    Ping,
    /// Session open, with the `heart-beat` header echoed back on reply
    Connect { heart_beat: String },
    /// Client publish; the destination may be absent, which routes nowhere
    Send { destination: Option<String> },
    /// Standing interest in a destination; both headers are required
    Subscribe { id: String, destination: String },
    /// Withdraw a subscription; a missing `id` header is a no-op
    Unsubscribe { id: Option<String> },
    /// Session teardown
    Disconnect,
    Ack,
    Nack,
    /// Recognized token the broker does not serve (BEGIN, COMMIT, ...)
    Unsupported(Command),
}

impl Request {
    /// Classify a parsed frame.
    ///
    /// Fails with [`Error::MissingSubscriptionHeaders`] when a SUBSCRIBE
    /// frame lacks `id` or `destination`; empty header values count as
    /// missing.
    pub fn classify(frame: &Frame) -> Result<Self> {
        let request = match frame.command {
            Command::Ping => Request::Ping,
            Command::Connect => Request::Connect {
                heart_beat: frame.header("heart-beat").unwrap_or("0,0").to_string(),
            },
            Command::Send => Request::Send {
                destination: frame.header("destination").map(str::to_string),
            },
            Command::Subscribe => {
                let id = frame.header("id").filter(|v| !v.is_empty());
                let destination = frame.header("destination").filter(|v| !v.is_empty());
                match (id, destination) {
                    (Some(id), Some(destination)) => Request::Subscribe {
                        id: id.to_string(),
                        destination: destination.to_string(),
                    },
                    _ => return Err(Error::MissingSubscriptionHeaders),
                }
            }
            Command::Unsubscribe => Request::Unsubscribe {
                id: frame.header("id").map(str::to_string),
            },
            Command::Disconnect => Request::Disconnect,
            Command::Ack => Request::Ack,
            Command::Nack => Request::Nack,
            other => Request::Unsupported(other),
        };
        Ok(request)
    }
}
