//! Relay action execution against live connections.
//!
//! Translates [`RelayAction`]s into pushes onto per-connection outbound
//! queues. The queues decouple driver processing from socket backpressure:
//! the driver lock is held only while pushing into channels, never across a
//! socket write, and each connection's write task drains its queue in FIFO
//! order so deliveries from one processing pass stay ordered.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use axum::extract::ws::Utf8Bytes;
use banter_core::connection::ConnectionId;
use banter_core::driver::RelayAction;
use tokio::sync::{RwLock, mpsc};

/// Instructions for a connection's write task.
#[derive(Debug, Clone)]
pub(crate) enum Outbound {
    /// Send a serialized event as a text frame.
    Event(Utf8Bytes),
    /// Send a close frame and stop writing.
    Close {
        /// Reason carried in the close frame.
        reason: String,
    },
}

/// Write-side handle for one registered connection.
pub(crate) struct ConnectionHandle {
    /// Queue drained by the connection's write task.
    pub(crate) outbound: mpsc::UnboundedSender<Outbound>,
    /// Wall-clock seconds of the last inbound frame, shared with the read
    /// task for the idle check.
    // Read through the task-held clones, never through the map entry.
    #[allow(dead_code)]
    pub(crate) last_seen_secs: Arc<AtomicU64>,
}

/// Registered connections, keyed by the id the driver routes with.
pub(crate) type ConnectionMap = RwLock<HashMap<ConnectionId, ConnectionHandle>>;

/// Execute relay actions against the registered connections.
///
/// Each `Deliver` is serialized once and the frame shared across targets.
/// Targets missing from the map are connections mid-teardown whose
/// `ConnectionClosed` has already reached the driver; those deliveries are
/// dropped with a debug log.
pub(crate) async fn execute_actions(actions: &[RelayAction], connections: &ConnectionMap) {
    for action in actions {
        match action {
            RelayAction::Deliver { targets, event } => {
                let frame: Utf8Bytes = match event.to_json() {
                    Ok(json) => json.into(),
                    Err(e) => {
                        tracing::error!("Failed to encode {} event: {}", event.name(), e);
                        continue;
                    },
                };

                let map = connections.read().await;
                for target in targets {
                    let Some(handle) = map.get(target) else {
                        tracing::debug!("Deliver target {} already gone", target);
                        continue;
                    };
                    if handle.outbound.send(Outbound::Event(frame.clone())).is_err() {
                        tracing::debug!("Outbound queue for {} closed", target);
                    }
                }
            },

            RelayAction::Disconnect { connection_id, reason } => {
                tracing::info!("Closing connection {}: {}", connection_id, reason);
                let map = connections.read().await;
                if let Some(handle) = map.get(connection_id) {
                    let _ = handle.outbound.send(Outbound::Close { reason: reason.clone() });
                }
            },
        }
    }
}
