//! Main broker implementation
//!
//! The broker is transport-agnostic - it can accept connections from any
//! transport that implements the `TransportServer` trait, with WebSocket as
//! the default front door.
//!
//! Each accepted connection gets its own session and its own read loop.
//! Client frames flow through parse → classify → dispatch; recoverable
//! protocol mistakes come back as ERROR frames on the same connection,
//! which stays open.

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use stompbox_core::{codec, Command, Error as CoreError, Frame, Request, HEARTBEAT, STOMP_VERSION};
use stompbox_transport::{
    TransportEvent, TransportReceiver, TransportSender, TransportServer, WebSocketConfig,
    WebSocketServer,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    auth::AuthProvider,
    error::Result,
    handler::HandlerRegistry,
    session::{Session, SessionId, SessionState},
    subscription::{Subscription, SubscriptionRegistry},
};

/// Broker configuration
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Server name advertised in CONNECTED frames
    pub name: String,
    /// WebSocket mount path; `None` accepts every path
    pub path: Option<String>,
    /// Delay before answering a heartbeat probe
    pub heartbeat_delay: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            name: "Stompbox".to_string(),
            path: None,
            heartbeat_delay: Duration::from_secs(1),
        }
    }
}

/// STOMP message broker
pub struct Broker {
    config: BrokerConfig,
    /// Active sessions
    sessions: Arc<DashMap<SessionId, Arc<Session>>>,
    /// Client subscriptions (outbound fan-out)
    subscriptions: Arc<SubscriptionRegistry>,
    /// Host handlers (inbound SEND routing)
    handlers: Arc<HandlerRegistry>,
    /// Optional CONNECT authentication
    auth: Option<Arc<dyn AuthProvider>>,
    /// Running flag
    running: Arc<RwLock<bool>>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            sessions: Arc::new(DashMap::new()),
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            handlers: Arc::new(HandlerRegistry::new()),
            auth: None,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Require CONNECT frames to pass the given provider
    pub fn with_auth(mut self, auth: impl AuthProvider + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    // =========================================================================
    // Serving
    // =========================================================================

    /// Serve using any TransportServer implementation.
    ///
    /// This is the core method that transport-specific methods use
    /// internally.
    pub async fn serve_on<S>(&self, mut server: S) -> Result<()>
    where
        S: TransportServer + 'static,
        S::Sender: 'static,
        S::Receiver: 'static,
    {
        info!("Broker accepting connections");
        *self.running.write() = true;

        while *self.running.read() {
            match server.accept().await {
                Ok((sender, receiver, addr)) => {
                    info!("New connection from {}", addr);
                    self.handle_connection(Arc::new(sender), receiver, addr);
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Start the broker on WebSocket (default, recommended).
    ///
    /// Honors the configured mount path; clients negotiate the
    /// `v12.stomp` subprotocol. Default port: 61613.
    pub async fn serve_websocket(&self, addr: &str) -> Result<()> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.path = self.config.path.clone();

        let server = WebSocketServer::bind(addr).await?.with_config(ws_config);
        self.serve_on(server).await
    }

    /// Internal clone for spawning connection tasks.
    /// Shares all Arc state with the original.
    fn clone_internal(&self) -> Self {
        Self {
            config: self.config.clone(),
            sessions: Arc::clone(&self.sessions),
            subscriptions: Arc::clone(&self.subscriptions),
            handlers: Arc::clone(&self.handlers),
            auth: self.auth.clone(),
            running: Arc::clone(&self.running),
        }
    }

    /// Handle a new connection
    fn handle_connection(
        &self,
        sender: Arc<dyn TransportSender>,
        mut receiver: impl TransportReceiver + 'static,
        addr: SocketAddr,
    ) {
        let broker = self.clone_internal();

        tokio::spawn(async move {
            let session = Arc::new(Session::new(sender));
            broker.sessions.insert(session.id.clone(), session.clone());
            debug!("Session {} created for {}", session.id, addr);

            while *broker.running.read() {
                match receiver.recv().await {
                    Some(TransportEvent::Data(data)) => {
                        broker.handle_data(&session, &data).await;
                        if session.state() == SessionState::Closed {
                            break;
                        }
                    }
                    Some(TransportEvent::Disconnected { reason }) => {
                        info!("Client {} disconnected: {:?}", addr, reason);
                        break;
                    }
                    Some(TransportEvent::Error(e)) => {
                        error!("Transport error from {}: {}", addr, e);
                        break;
                    }
                    Some(TransportEvent::Connected) => {}
                    None => break,
                }
            }

            info!("Removing session {}", session.id);
            broker.sessions.remove(&session.id);
            broker.subscriptions.remove_session(&session.id);
            session.close().await;
        });
    }

    /// Parse one inbound payload and route it. Parse and classification
    /// failures are recoverable: the client gets an ERROR frame and the
    /// connection stays open.
    async fn handle_data(&self, session: &Arc<Session>, data: &[u8]) {
        match codec::parse(data) {
            Ok(frame) => self.dispatch(session, frame).await,
            Err(CoreError::UnknownCommand(token)) => {
                warn!("Unknown command from {}: {}", session.id, token);
                self.send_error(session, &format!("Unsupported command: {}", token))
                    .await;
            }
            Err(e) => {
                warn!("Frame parse error from {}: {}", session.id, e);
                self.send_error(session, "Invalid frame format").await;
            }
        }
    }

    async fn dispatch(&self, session: &Arc<Session>, frame: Frame) {
        let request = match Request::classify(&frame) {
            Ok(request) => request,
            Err(CoreError::MissingSubscriptionHeaders) => {
                self.send_error(session, "Missing subscription headers").await;
                return;
            }
            Err(e) => {
                warn!("Classify error from {}: {}", session.id, e);
                self.send_error(session, "Invalid frame format").await;
                return;
            }
        };

        match request {
            Request::Ping => self.handle_ping(session),
            Request::Connect { heart_beat } => {
                self.handle_connect(session, &frame, &heart_beat).await;
            }
            Request::Send { destination } => {
                if let Some(destination) = destination {
                    if !self.handlers.dispatch(&destination, &frame) {
                        debug!("No handler for destination {}", destination);
                    }
                } else {
                    debug!("SEND without destination from {}", session.id);
                }
            }
            Request::Subscribe { id, destination } => {
                debug!(
                    "Session {} subscribed to {} as {}",
                    session.id, destination, id
                );
                self.subscriptions.add(Subscription {
                    id,
                    destination,
                    session: session.clone(),
                });
            }
            Request::Unsubscribe { id } => {
                if let Some(id) = id {
                    self.subscriptions.remove(&session.id, &id);
                }
            }
            Request::Disconnect => {
                debug!("Session {} disconnecting", session.id);
                self.subscriptions.remove_session(&session.id);
                session.close().await;
            }
            Request::Ack | Request::Nack => {
                // acknowledged delivery is not implemented; tolerated for
                // client compatibility
                debug!("Ack/nack from {} ignored", session.id);
            }
            Request::Unsupported(command) => {
                self.send_error(session, &format!("Unsupported command: {}", command))
                    .await;
            }
        }
    }

    async fn handle_connect(&self, session: &Arc<Session>, frame: &Frame, heart_beat: &str) {
        if let Some(ref auth) = self.auth {
            if !auth.authenticate(frame).await {
                warn!("Authentication failed for session {}", session.id);
                self.send_error(session, "Authentication failed").await;
                session.close().await;
                return;
            }
        }

        let connected = Frame::new(Command::Connected)
            .with_header("version", STOMP_VERSION)
            .with_header("server", &self.config.name)
            .with_header("session", &session.id)
            .with_header("heart-beat", heart_beat);

        if let Err(e) = session.send_frame(&connected).await {
            warn!("Failed to send CONNECTED to {}: {}", session.id, e);
            return;
        }
        session.set_state(SessionState::Connected);
        info!("Session {} connected", session.id);
    }

    /// A bare LF is a liveness probe: sweep subscriptions whose transport
    /// has dropped, then answer with a delayed heartbeat of our own. The
    /// reply task is cancelled if the session closes first, and the write
    /// is skipped if the connection dropped while waiting.
    fn handle_ping(&self, session: &Arc<Session>) {
        self.subscriptions.sweep_closed();

        let delay = self.config.heartbeat_delay;
        let session_ref = session.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !session_ref.is_open() {
                return;
            }
            let _ = session_ref.ping().await;
            let _ = session_ref.send_raw(Bytes::from_static(HEARTBEAT)).await;
        });
        session.set_heartbeat_task(handle);
    }

    // =========================================================================
    // Host API
    // =========================================================================

    /// Publish a message to every client subscribed to `destination`
    pub async fn send(&self, destination: &str, body: &str) {
        self.send_with_headers(destination, body, HashMap::new())
            .await;
    }

    /// Publish with additional headers; caller headers override the
    /// generated ones.
    pub async fn send_with_headers(
        &self,
        destination: &str,
        body: &str,
        headers: HashMap<String, String>,
    ) {
        let subscribers = self.subscriptions.list_by_destination(destination);
        if subscribers.is_empty() {
            debug!("No subscribers on {}", destination);
            return;
        }

        let timestamp = unix_millis().to_string();
        for sub in subscribers {
            let mut frame = Frame::new(Command::Message)
                .with_header("destination", destination)
                .with_header("message-id", Uuid::new_v4().to_string())
                .with_header("timestamp", &timestamp)
                .with_header("subscription", &sub.id)
                .with_body(body);
            for (key, value) in &headers {
                frame = frame.with_header(key, value);
            }

            if sub.session.is_open() {
                if let Err(e) = sub.session.send_frame(&frame).await {
                    warn!("Delivery to session {} failed: {}", sub.session.id, e);
                }
            }
        }
    }

    /// Register a handler for client SEND frames addressed to `destination`
    pub fn subscribe<F>(&self, destination: &str, handler: F)
    where
        F: Fn(Frame) + Send + Sync + 'static,
    {
        self.handlers.subscribe(destination, handler);
    }

    /// Drop the handler for `destination`
    pub fn unsubscribe(&self, destination: &str) {
        self.handlers.unsubscribe(destination);
    }

    /// Stop the broker
    pub fn stop(&self) {
        *self.running.write() = false;
    }

    /// Get session count
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Get subscription count
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Reply with an ERROR frame. Write failures are logged, not
    /// propagated: the read loop notices the dead transport on its own.
    async fn send_error(&self, session: &Arc<Session>, message: &str) {
        let frame = Frame::new(Command::Error)
            .with_header("content-type", "text/plain")
            .with_body(message);
        if let Err(e) = session.send_frame(&frame).await {
            debug!("Failed to send ERROR to {}: {}", session.id, e);
        }
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
