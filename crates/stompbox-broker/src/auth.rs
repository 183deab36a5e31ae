//! Connection authentication
//!
//! Consulted only while handling CONNECT, reading the `login` and
//! `passcode` headers of the frame. The provider may suspend (an external
//! decision) without blocking other connections.

use async_trait::async_trait;
use stompbox_core::Frame;

/// Authentication capability checked against the CONNECT frame
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, frame: &Frame) -> bool;
}

/// Static credential check against a single login/passcode pair
#[derive(Debug, Clone)]
pub struct SimpleAuthProvider {
    login: String,
    passcode: String,
}

impl SimpleAuthProvider {
    /// Missing credentials default to `anonymous`
    pub fn new(login: Option<String>, passcode: Option<String>) -> Self {
        Self {
            login: login.unwrap_or_else(|| "anonymous".to_string()),
            passcode: passcode.unwrap_or_else(|| "anonymous".to_string()),
        }
    }
}

impl Default for SimpleAuthProvider {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[async_trait]
impl AuthProvider for SimpleAuthProvider {
    async fn authenticate(&self, frame: &Frame) -> bool {
        frame.header("login").is_some_and(|login| login == self.login)
            && frame
                .header("passcode")
                .is_some_and(|passcode| passcode == self.passcode)
    }
}
