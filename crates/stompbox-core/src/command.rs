//! STOMP command set

use std::fmt;

/// The fifteen STOMP command tokens.
///
/// Only a subset is actively served by the broker (CONNECT, SEND,
/// SUBSCRIBE, UNSUBSCRIBE, DISCONNECT, PING, ACK, NACK); the rest are
/// recognized so they can be rejected with a precise error instead of a
/// generic parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Ping,
    Connect,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// The wire token for this command
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// Look up a command by its wire token. Tokens are case-sensitive.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "PING" => Some(Command::Ping),
            "CONNECT" => Some(Command::Connect),
            "CONNECTED" => Some(Command::Connected),
            "SEND" => Some(Command::Send),
            "SUBSCRIBE" => Some(Command::Subscribe),
            "UNSUBSCRIBE" => Some(Command::Unsubscribe),
            "ACK" => Some(Command::Ack),
            "NACK" => Some(Command::Nack),
            "BEGIN" => Some(Command::Begin),
            "COMMIT" => Some(Command::Commit),
            "ABORT" => Some(Command::Abort),
            "DISCONNECT" => Some(Command::Disconnect),
            "MESSAGE" => Some(Command::Message),
            "RECEIPT" => Some(Command::Receipt),
            "ERROR" => Some(Command::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
