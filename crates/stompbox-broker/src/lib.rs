//! Stompbox Broker
//!
//! The broker is the server side of the STOMP protocol:
//! - Manages client sessions and their connection state machine
//! - Routes client SUBSCRIBE/UNSUBSCRIBE into the subscription registry
//! - Broadcasts host-published messages to subscribed clients
//! - Hands client SEND frames to host-registered callbacks
//! - Authenticates CONNECT frames through a pluggable provider
//!
//! # Example
//!
//! ```no_run
//! use stompbox_broker::{Broker, BrokerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = Broker::new(BrokerConfig::default());
//!
//!     broker.subscribe("/queue/inbox", |frame| {
//!         println!("client sent: {}", frame.body);
//!     });
//!
//!     broker.serve_websocket("0.0.0.0:61613").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod broker;
pub mod error;
pub mod handler;
pub mod session;
pub mod subscription;

pub use auth::{AuthProvider, SimpleAuthProvider};
pub use broker::{Broker, BrokerConfig};
pub use error::{BrokerError, Result};
pub use handler::HandlerRegistry;
pub use session::{Session, SessionId, SessionState};
pub use subscription::{Subscription, SubscriptionRegistry};
