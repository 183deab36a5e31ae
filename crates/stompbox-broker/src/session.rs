//! Session management
//!
//! A session tracks one client connection: its transport sender, the
//! protocol state machine (`AwaitingConnect → Connected → Closed`), and
//! the pending delayed heartbeat reply, if any.

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;
use stompbox_core::{codec, Frame};
use stompbox_transport::{TransportError, TransportSender};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Session identifier
pub type SessionId = String;

/// Protocol state of a connection. `Closed` is terminal: no frame is
/// processed for a closed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingConnect,
    Connected,
    Closed,
}

/// A connected client session
pub struct Session {
    /// Unique session ID
    pub id: SessionId,
    /// Transport sender for this session
    sender: Arc<dyn TransportSender>,
    state: RwLock<SessionState>,
    /// Pending delayed heartbeat reply
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    /// Session creation time
    pub created_at: Instant,
}

impl Session {
    pub fn new(sender: Arc<dyn TransportSender>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            state: RwLock::new(SessionState::AwaitingConnect),
            heartbeat: Mutex::new(None),
            created_at: Instant::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Transition the state machine. Closed is terminal and never left.
    pub fn set_state(&self, state: SessionState) {
        let mut guard = self.state.write();
        if *guard != SessionState::Closed {
            *guard = state;
        }
    }

    /// Whether the transport is open and the session is not terminally
    /// closed. Broadcast and heartbeat writes are gated on this.
    pub fn is_open(&self) -> bool {
        self.state() != SessionState::Closed && self.sender.is_connected()
    }

    /// Serialize and send a frame to this session
    pub async fn send_frame(&self, frame: &Frame) -> Result<(), TransportError> {
        self.sender.send(codec::serialize(frame)).await
    }

    /// Send raw bytes (the bare heartbeat octet)
    pub async fn send_raw(&self, data: Bytes) -> Result<(), TransportError> {
        self.sender.send(data).await
    }

    /// Send a transport-level liveness probe
    pub async fn ping(&self) -> Result<(), TransportError> {
        self.sender.ping().await
    }

    /// Store the delayed heartbeat reply task, aborting a still-pending
    /// earlier one.
    pub fn set_heartbeat_task(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.heartbeat.lock().replace(handle) {
            previous.abort();
        }
    }

    fn abort_heartbeat(&self) {
        if let Some(handle) = self.heartbeat.lock().take() {
            handle.abort();
        }
    }

    /// Terminally close the session: cancel the pending heartbeat, mark
    /// Closed, and close the transport.
    pub async fn close(&self) {
        self.abort_heartbeat();
        *self.state.write() = SessionState::Closed;
        let _ = self.sender.close().await;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
