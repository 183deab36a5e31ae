//! STOMP frame value type

use std::collections::HashMap;

use crate::Command;

/// One protocol message unit: command, headers, body.
///
/// Frames are immutable values once built; header keys are unique and
/// insertion order carries no meaning on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Frame {
    /// Create a frame with no headers and an empty body
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// Add a header, replacing any existing value for the same key
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}
