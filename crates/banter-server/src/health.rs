//! Liveness endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use banter_core::env::Environment;
use serde::Serialize;

use crate::SharedState;

/// Body of the `/health` response.
///
/// Field names are `camelCase` for the same browser consumers the wire
/// protocol serves.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthSnapshot {
    /// Fixed "ok" marker; reaching the endpoint at all is the check.
    status: &'static str,
    /// Open WebSocket connections, authenticated or not.
    connection_count: usize,
    /// Distinct users with at least one live connection.
    online_user_count: usize,
    /// Seconds since the server started.
    uptime_secs: u64,
    /// RFC 3339 stamp of when the snapshot was taken.
    timestamp: String,
}

/// Report relay liveness and coarse load counters.
pub(crate) async fn health_handler(State(state): State<Arc<SharedState>>) -> Json<HealthSnapshot> {
    let (connection_count, online_user_count) = {
        let driver = state.driver.lock().await;
        (driver.connection_count(), driver.online_user_count())
    };

    Json(HealthSnapshot {
        status: "ok",
        connection_count,
        online_user_count,
        uptime_secs: (state.env.now() - state.started_at).as_secs(),
        timestamp: state.env.timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = HealthSnapshot {
            status: "ok",
            connection_count: 2,
            online_user_count: 1,
            uptime_secs: 30,
            timestamp: "2024-01-15T10:50:00.000Z".to_string(),
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["connectionCount"], 2);
        assert_eq!(json["onlineUserCount"], 1);
        assert_eq!(json["uptimeSecs"], 30);
        assert_eq!(json["timestamp"], "2024-01-15T10:50:00.000Z");
    }
}
