//! WebSocket transport.
//!
//! Owns the `/ws` upgrade and the per-connection task pair: a read task
//! that funnels decoded client events through the driver, and a write task
//! that drains the outbound queue and paces heartbeat pings. Either task
//! ending tears the connection down, and the teardown path reports
//! `ConnectionClosed` to the driver exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use banter_core::connection::ConnectionId;
use banter_core::driver::RelayEvent;
use banter_core::env::Environment;
use banter_proto::ClientEvent;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::SharedState;
use crate::executor::{ConnectionHandle, Outbound, execute_actions};
use crate::system_env::SystemEnv;

/// Upgrade an HTTP request into a relay WebSocket session.
// axum handlers are async even when the body never awaits.
#[allow(clippy::unused_async)]
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SharedState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one WebSocket connection from accept to teardown.
pub(crate) async fn handle_socket(socket: WebSocket, state: Arc<SharedState>) {
    let connection_id = ConnectionId::new(state.env.random_u64());
    tracing::debug!("New connection: {}", connection_id);

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let last_seen_secs = Arc::new(AtomicU64::new(now_secs(&state.env)));

    {
        let mut map = state.connections.write().await;
        map.insert(connection_id, ConnectionHandle {
            outbound: outbound_tx,
            last_seen_secs: Arc::clone(&last_seen_secs),
        });
    }

    // The admission cap answers with a Disconnect that lands on this
    // connection's own queue, so the handle must be registered first.
    {
        let mut driver = state.driver.lock().await;
        let actions = driver.process_event(RelayEvent::ConnectionOpened { connection_id });
        execute_actions(&actions, &state.connections).await;
    }

    let (sink, stream) = socket.split();

    let mut write_task = tokio::spawn(write_loop(
        sink,
        outbound_rx,
        Arc::clone(&last_seen_secs),
        Arc::clone(&state),
        connection_id,
    ));
    let mut read_task =
        tokio::spawn(read_loop(stream, connection_id, Arc::clone(&state), last_seen_secs));

    let reason = tokio::select! {
        finished = &mut write_task => {
            read_task.abort();
            finished.unwrap_or("write task failed")
        },
        finished = &mut read_task => {
            write_task.abort();
            finished.unwrap_or("read task failed")
        },
    };

    {
        let mut map = state.connections.write().await;
        map.remove(&connection_id);
    }

    {
        let mut driver = state.driver.lock().await;
        let actions = driver.process_event(RelayEvent::ConnectionClosed {
            connection_id,
            reason: reason.to_string(),
        });
        execute_actions(&actions, &state.connections).await;
    }

    tracing::debug!("Connection {} torn down: {}", connection_id, reason);
}

/// Read frames until the peer goes away, funneling decoded events through
/// the driver.
///
/// Malformed frames are dropped here and never reach the driver; the
/// connection stays up.
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    connection_id: ConnectionId,
    state: Arc<SharedState>,
    last_seen_secs: Arc<AtomicU64>,
) -> &'static str {
    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Read error on {}: {}", connection_id, e);
                return "transport error";
            },
        };

        last_seen_secs.store(now_secs(&state.env), Ordering::Relaxed);

        match message {
            Message::Text(text) => {
                let event = match ClientEvent::from_json(text.as_str()) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::debug!("Dropping malformed frame on {}: {}", connection_id, e);
                        continue;
                    },
                };

                // Processing and queueing happen under one lock acquisition
                // so room deliveries keep their order.
                let mut driver = state.driver.lock().await;
                let actions =
                    driver.process_event(RelayEvent::EventReceived { connection_id, event });
                execute_actions(&actions, &state.connections).await;
            },
            Message::Binary(_) => {
                tracing::debug!("Ignoring binary frame on {}", connection_id);
            },
            // Any inbound frame counts as liveness; axum answers pings
            // itself.
            Message::Ping(_) | Message::Pong(_) => {},
            Message::Close(_) => return "peer closed",
        }
    }

    "peer closed"
}

/// Drain the outbound queue into the socket and pace heartbeat pings.
///
/// Each heartbeat tick doubles as the idle check: a peer that has sent
/// nothing (not even a pong) for the idle timeout is closed from here.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    last_seen_secs: Arc<AtomicU64>,
    state: Arc<SharedState>,
    connection_id: ConnectionId,
) -> &'static str {
    let mut heartbeat = tokio::time::interval(state.heartbeat_interval);
    // The first tick completes immediately; consume it so pings start one
    // interval in.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(Outbound::Event(frame)) => {
                    if sink.send(Message::Text(frame)).await.is_err() {
                        return "transport error";
                    }
                },
                Some(Outbound::Close { reason }) => {
                    let frame = CloseFrame { code: close_code::AGAIN, reason: reason.into() };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    return "server disconnected";
                },
                None => return "server disconnected",
            },
            _ = heartbeat.tick() => {
                let idle_secs =
                    now_secs(&state.env).saturating_sub(last_seen_secs.load(Ordering::Relaxed));
                if idle_secs >= state.idle_timeout.as_secs() {
                    tracing::debug!("Connection {} idle for {}s, closing", connection_id, idle_secs);
                    let frame =
                        CloseFrame { code: close_code::NORMAL, reason: "idle timeout".into() };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    return "idle timeout";
                }
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    return "transport error";
                }
            },
        }
    }
}

/// Wall-clock seconds for liveness bookkeeping.
fn now_secs(env: &SystemEnv) -> u64 {
    env.wall_clock_ms() / 1_000
}
