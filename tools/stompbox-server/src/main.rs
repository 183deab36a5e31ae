//! Stompbox Broker Server
//!
//! A standalone STOMP-over-WebSocket broker that accepts client
//! connections and fans host-published messages out to subscribers.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use stompbox_broker::{Broker, BrokerConfig, SimpleAuthProvider};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stompbox")]
#[command(about = "Stompbox STOMP broker server")]
#[command(version)]
struct Cli {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:61613")]
    listen: SocketAddr,

    /// Server name advertised to clients
    #[arg(short, long, default_value = "Stompbox")]
    name: String,

    /// WebSocket mount path (all paths accepted when omitted)
    #[arg(short, long)]
    path: Option<String>,

    /// Required login; enables authentication
    #[arg(long)]
    login: Option<String>,

    /// Required passcode; enables authentication
    #[arg(long)]
    passcode: Option<String>,

    /// Heartbeat reply delay in milliseconds
    #[arg(long, default_value_t = 1000)]
    heartbeat_delay_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Stompbox broker");
    tracing::info!("Listening on: {}", cli.listen);

    let config = BrokerConfig {
        name: cli.name.clone(),
        path: cli.path.clone(),
        heartbeat_delay: Duration::from_millis(cli.heartbeat_delay_ms),
    };

    let mut broker = Broker::new(config);
    if cli.login.is_some() || cli.passcode.is_some() {
        tracing::info!("Authentication enabled");
        broker = broker.with_auth(SimpleAuthProvider::new(cli.login, cli.passcode));
    }

    tracing::info!("Broker ready, accepting connections...");

    let addr_str = cli.listen.to_string();
    broker.serve_websocket(&addr_str).await?;

    Ok(())
}
