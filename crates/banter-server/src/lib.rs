//! Banter production server.
//!
//! Production relay implementation using axum for HTTP + WebSocket
//! transport, Tokio for async runtime, and system time with cryptographic
//! RNG.
//!
//! # Architecture
//!
//! This crate provides production "glue" that wraps [`banter_core`]'s
//! action-based logic with real I/O. The [`RelayDriver`] follows the
//! Sans-IO pattern (see [`banter_core`] for details); this crate feeds it
//! connection lifecycle and decoded client events, and executes the
//! actions it returns against live sockets.
//!
//! # Components
//!
//! - [`RelayDriver`]: action-based relay orchestrator (pure logic, no I/O)
//! - [`Server`]: production runtime serving `GET /ws` and `GET /health`
//! - [`SystemEnv`]: production environment (real time, crypto RNG)
//!
//! [`RelayDriver`]: banter_core::driver::RelayDriver

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod executor;
mod health;
mod system_env;
mod transport;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
pub use banter_core::driver::RelayConfig;
use banter_core::driver::RelayDriver;
use banter_core::env::Environment;
pub use error::ServerError;
use executor::ConnectionMap;
pub use system_env::SystemEnv;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;

/// Default interval between server heartbeat pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

/// Default silence tolerated before a connection is closed as idle.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared state behind every connection task and route handler.
pub(crate) struct SharedState {
    /// The relay driver, serialized behind one lock so every event is
    /// processed and its actions queued atomically.
    pub(crate) driver: Mutex<RelayDriver<SystemEnv>>,
    /// Write-side handles for registered connections.
    pub(crate) connections: ConnectionMap,
    /// Environment (time, RNG).
    pub(crate) env: SystemEnv,
    /// Server start, for the health endpoint's uptime counter.
    pub(crate) started_at: std::time::Instant,
    /// Interval between heartbeat pings.
    pub(crate) heartbeat_interval: Duration,
    /// Silence tolerated before a connection is closed as idle.
    pub(crate) idle_timeout: Duration,
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:3002")
    pub bind_address: String,
    /// Interval between heartbeat pings.
    pub heartbeat_interval: Duration,
    /// Silence tolerated before a connection is closed as idle.
    pub idle_timeout: Duration,
    /// Relay configuration (connection cap).
    pub relay: RelayConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3002".to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            relay: RelayConfig::default(),
        }
    }
}

/// Production Banter relay server.
///
/// Wraps [`RelayDriver`] with axum WebSocket transport and the system
/// environment.
///
/// [`RelayDriver`]: banter_core::driver::RelayDriver
pub struct Server {
    /// Bound listener, held so tests can read the ephemeral port before
    /// serving starts.
    listener: TcpListener,
    /// State shared with connection tasks and route handlers.
    state: Arc<SharedState>,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: RuntimeConfig) -> Result<Self, ServerError> {
        if config.heartbeat_interval >= config.idle_timeout {
            return Err(ServerError::Config(format!(
                "heartbeat interval ({:?}) must be shorter than idle timeout ({:?})",
                config.heartbeat_interval, config.idle_timeout
            )));
        }

        let env = SystemEnv::new();
        let driver = RelayDriver::new(env.clone(), config.relay);
        let listener = TcpListener::bind(&config.bind_address).await?;
        let started_at = env.now();

        let state = Arc::new(SharedState {
            driver: Mutex::new(driver),
            connections: RwLock::new(HashMap::new()),
            env,
            started_at,
            heartbeat_interval: config.heartbeat_interval,
            idle_timeout: config.idle_timeout,
        });

        Ok(Self { listener, state })
    }

    /// Run the server, accepting connections until shutdown.
    ///
    /// Returns after ctrl-c or SIGTERM once in-flight upgrades finish.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Relay serving on {}", self.listener.local_addr()?);

        let router = build_router(self.state);
        axum::serve(self.listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("Relay shut down");
        Ok(())
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Routes: the WebSocket upgrade and the health probe.
///
/// CORS is permissive; the relay fronts browser clients served from other
/// origins and carries no credentialed requests.
fn build_router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/ws", get(transport::ws_handler))
        .route("/health", get(health::health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install ctrl-c handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received ctrl-c, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
