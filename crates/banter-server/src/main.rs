//! Banter relay server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default chat port
//! banter-server --bind 0.0.0.0:3002
//!
//! # Tighter liveness for flaky mobile clients
//! banter-server --heartbeat-interval-secs 10 --idle-timeout-secs 30
//! ```

use std::time::Duration;

use banter_server::{RelayConfig, RuntimeConfig, Server};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Banter relay server
#[derive(Parser, Debug)]
#[command(name = "banter-server")]
#[command(about = "Realtime presence and room relay for Banter chat clients")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:3002")]
    bind: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Seconds between heartbeat pings
    #[arg(long, default_value = "20")]
    heartbeat_interval_secs: u64,

    /// Seconds of client silence before the connection is closed
    #[arg(long, default_value = "60")]
    idle_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Banter relay starting");
    tracing::info!("Binding to {}", args.bind);

    let config = RuntimeConfig {
        bind_address: args.bind,
        heartbeat_interval: Duration::from_secs(args.heartbeat_interval_secs),
        idle_timeout: Duration::from_secs(args.idle_timeout_secs),
        relay: RelayConfig { max_connections: args.max_connections },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Relay listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
