//! WebSocket transport implementation

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async_with_config, WebSocketStream,
    tungstenite::{
        client::IntoClientRequest,
        handshake::server::{ErrorResponse, Request as HsRequest, Response as HsResponse},
        http::{HeaderValue, StatusCode},
        protocol::{Message as WsMessage, WebSocketConfig as WsProtocolConfig},
    },
};
use tracing::{debug, error, info};

use crate::error::{Result, TransportError};
use crate::traits::{
    Transport, TransportEvent, TransportReceiver, TransportSender, TransportServer,
};

use stompbox_core::WS_SUBPROTOCOL;

/// WebSocket configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Mount path; requests for any other path are rejected with 404.
    /// `None` accepts every path.
    pub path: Option<String>,
    /// Subprotocol echoed back when the client requests it
    pub subprotocol: String,
    /// Maximum message size
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            path: None,
            subprotocol: WS_SUBPROTOCOL.to_string(),
            max_message_size: 64 * 1024, // 64KB
        }
    }
}

/// WebSocket transport (client side)
pub struct WebSocketTransport;

/// WebSocket sender
pub struct WebSocketSender {
    tx: mpsc::Sender<WsMessage>,
    connected: Arc<Mutex<bool>>,
}

#[async_trait]
impl TransportSender for WebSocketSender {
    async fn send(&self, data: Bytes) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        self.tx
            .send(WsMessage::Binary(data.to_vec()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn ping(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        self.tx
            .send(WsMessage::Ping(Vec::new()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    async fn close(&self) -> Result<()> {
        let _ = self.tx.send(WsMessage::Close(None)).await;
        *self.connected.lock() = false;
        Ok(())
    }
}

/// WebSocket receiver
pub struct WebSocketReceiver {
    rx: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
impl TransportReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// Drive a split WebSocket stream: a writer task draining the outbound
/// channel into the sink, a reader task pumping stream items into
/// transport events. Both flip the shared `connected` flag on exit.
fn spawn_stream_tasks<S>(stream: WebSocketStream<S>) -> (WebSocketSender, WebSocketReceiver)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (write, read) = stream.split();

    let (send_tx, mut send_rx) = mpsc::channel::<WsMessage>(100);
    let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(100);

    let connected = Arc::new(Mutex::new(true));
    let connected_write = connected.clone();
    let connected_read = connected.clone();

    tokio::spawn(async move {
        let mut write = write;
        while let Some(msg) = send_rx.recv().await {
            if let Err(e) = write.send(msg).await {
                error!("WebSocket write error: {}", e);
                break;
            }
        }
        *connected_write.lock() = false;
    });

    tokio::spawn(async move {
        let mut read = read;

        let _ = event_tx.send(TransportEvent::Connected).await;

        while let Some(result) = read.next().await {
            match result {
                Ok(msg) => match msg {
                    // STOMP clients legitimately frame with either opcode
                    WsMessage::Binary(data) => {
                        let _ = event_tx.send(TransportEvent::Data(Bytes::from(data))).await;
                    }
                    WsMessage::Text(text) => {
                        let _ = event_tx.send(TransportEvent::Data(Bytes::from(text))).await;
                    }
                    WsMessage::Ping(_) => {
                        // pong is handled by tungstenite
                        debug!("Received ping");
                    }
                    WsMessage::Pong(_) => {
                        debug!("Received pong");
                    }
                    WsMessage::Close(frame) => {
                        let reason = frame.map(|f| f.reason.to_string());
                        info!("WebSocket closed: {:?}", reason);
                        let _ = event_tx
                            .send(TransportEvent::Disconnected { reason })
                            .await;
                        break;
                    }
                    WsMessage::Frame(_) => {}
                },
                Err(e) => {
                    error!("WebSocket read error: {}", e);
                    let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                    let _ = event_tx
                        .send(TransportEvent::Disconnected {
                            reason: Some(e.to_string()),
                        })
                        .await;
                    break;
                }
            }
        }

        *connected_read.lock() = false;
    });

    (
        WebSocketSender {
            tx: send_tx,
            connected,
        },
        WebSocketReceiver { rx: event_rx },
    )
}

#[async_trait]
impl Transport for WebSocketTransport {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn connect(url: &str) -> Result<(Self::Sender, Self::Receiver)> {
        info!("Connecting to WebSocket: {}", url);

        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(WS_SUBPROTOCOL),
        );

        let mut ws_config = WsProtocolConfig::default();
        ws_config.max_message_size = Some(WebSocketConfig::default().max_message_size);

        let (ws_stream, response) = connect_async_with_config(request, Some(ws_config), false)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        debug!("WebSocket connected, response: {:?}", response.status());

        Ok(spawn_stream_tasks(ws_stream))
    }
}

/// WebSocket server
pub struct WebSocketServer {
    listener: tokio::net::TcpListener,
    config: WebSocketConfig,
}

impl WebSocketServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!("WebSocket server listening on {}", addr);

        Ok(Self {
            listener,
            config: WebSocketConfig::default(),
        })
    }

    pub fn with_config(mut self, config: WebSocketConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl TransportServer for WebSocketServer {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, SocketAddr)> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        debug!("Accepted TCP connection from {}", addr);

        let mount = self.config.path.clone();
        let subprotocol = self.config.subprotocol.clone();

        let callback = move |req: &HsRequest, mut response: HsResponse| {
            // Reject requests outside the configured mount path.
            if let Some(ref mount) = mount {
                if req.uri().path() != mount {
                    debug!("Rejecting upgrade for path {}", req.uri().path());
                    let mut reject = ErrorResponse::new(Some("not found".to_string()));
                    *reject.status_mut() = StatusCode::NOT_FOUND;
                    return Err(reject);
                }
            }

            // Echo our subprotocol when the client requested it.
            if let Some(protocols) = req.headers().get("Sec-WebSocket-Protocol") {
                if let Ok(protocols_str) = protocols.to_str() {
                    let requested: Vec<&str> =
                        protocols_str.split(',').map(|s| s.trim()).collect();
                    if requested.contains(&subprotocol.as_str()) {
                        if let Ok(value) = HeaderValue::from_str(&subprotocol) {
                            response
                                .headers_mut()
                                .insert("Sec-WebSocket-Protocol", value);
                        }
                    }
                }
            }

            Ok(response)
        };

        let mut ws_config = WsProtocolConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);

        let ws_stream =
            tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(ws_config))
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!("WebSocket client connected from {}", addr);

        let (sender, receiver) = spawn_stream_tasks(ws_stream);
        Ok((sender, receiver, addr))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(TransportError::Io)
    }

    async fn close(&self) -> Result<()> {
        // the TCP listener needs no explicit close
        Ok(())
    }
}
