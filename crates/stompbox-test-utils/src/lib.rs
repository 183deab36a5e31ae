//! Common test helpers and utilities for Stompbox tests
//!
//! This crate provides:
//! - Condition-based waiting (no hardcoded sleeps)
//! - Proper resource cleanup with RAII
//! - Test broker management
//! - Frame collectors for handler testing

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stompbox_broker::{Broker, BrokerConfig};
use stompbox_core::Frame;
use tokio::sync::Notify;
use tokio::time::timeout;

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Port Allocation
// ============================================================================

/// Find an available TCP port for testing
pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F, Fut>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Wait for an atomic counter to reach a target value
pub async fn wait_for_count(counter: &AtomicU32, target: u32, max_wait: Duration) -> bool {
    wait_for(
        || async { counter.load(Ordering::SeqCst) >= target },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

/// Wait for a boolean flag to become true
pub async fn wait_for_flag(flag: &AtomicBool, max_wait: Duration) -> bool {
    wait_for(
        || async { flag.load(Ordering::SeqCst) },
        DEFAULT_CHECK_INTERVAL,
        max_wait,
    )
    .await
}

/// Wait with notification - more efficient than polling
pub async fn wait_with_notify(notify: &Notify, max_wait: Duration) -> bool {
    timeout(max_wait, notify.notified()).await.is_ok()
}

// ============================================================================
// Test Broker - RAII wrapper with proper cleanup
// ============================================================================

/// A test broker that automatically cleans up on drop
pub struct TestBroker {
    port: u16,
    broker: Arc<Broker>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestBroker {
    /// Start a test broker with default configuration
    pub async fn start() -> Self {
        Self::start_with(Broker::new(BrokerConfig {
            name: "Test Broker".to_string(),
            path: None,
            heartbeat_delay: Duration::from_millis(50),
        }))
        .await
    }

    /// Start a pre-built broker (custom config or auth)
    pub async fn start_with(broker: Broker) -> Self {
        let port = find_available_port().await;
        let addr = format!("127.0.0.1:{}", port);
        let broker = Arc::new(broker);

        let serving = broker.clone();
        let handle = tokio::spawn(async move {
            let _ = serving.serve_websocket(&addr).await;
        });

        // Wait until the port actually accepts connections
        let _ = wait_for(
            || {
                let port = port;
                async move {
                    tokio::net::TcpStream::connect(format!("127.0.0.1:{}", port))
                        .await
                        .is_ok()
                }
            },
            DEFAULT_CHECK_INTERVAL,
            Duration::from_secs(5),
        )
        .await;

        Self {
            port,
            broker,
            handle: Some(handle),
        }
    }

    /// Get the WebSocket URL for this broker
    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Access the broker for host-side calls
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Stop the broker explicitly (also happens on drop)
    pub fn stop(&mut self) {
        self.broker.stop();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TestBroker {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Frame Collector - for verifying dispatched frames
// ============================================================================

/// Collector for frames delivered to host handlers, with thread-safe access
#[derive(Clone)]
pub struct FrameCollector {
    frames: Arc<parking_lot::Mutex<Vec<Frame>>>,
    count: Arc<AtomicU32>,
    notify: Arc<Notify>,
}

impl FrameCollector {
    pub fn new() -> Self {
        Self {
            frames: Arc::new(parking_lot::Mutex::new(Vec::new())),
            count: Arc::new(AtomicU32::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Create a callback suitable for `Broker::subscribe`
    pub fn callback(&self) -> impl Fn(Frame) + Send + Sync + 'static {
        let frames = self.frames.clone();
        let count = self.count.clone();
        let notify = self.notify.clone();

        move |frame| {
            frames.lock().push(frame);
            count.fetch_add(1, Ordering::SeqCst);
            notify.notify_waiters();
        }
    }

    /// Get the count of received frames
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait for at least n frames to arrive
    pub async fn wait_for_count(&self, n: u32, max_wait: Duration) -> bool {
        wait_for_count(&self.count, n, max_wait).await
    }

    /// Get all collected frames
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }

    /// Get the last frame received
    pub fn last(&self) -> Option<Frame> {
        self.frames.lock().last().cloned()
    }

    /// Clear all collected frames
    pub fn clear(&self) {
        self.frames.lock().clear();
        self.count.store(0, Ordering::SeqCst);
    }
}

impl Default for FrameCollector {
    fn default() -> Self {
        Self::new()
    }
}
