//! Server error types.

use thiserror::Error;

/// Errors from the production server runtime.
///
/// Per-connection failures (decode errors, socket resets) never surface
/// here; they are logged and end that connection only. `ServerError` covers
/// the failures that stop the whole server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Rejected runtime configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket-level failure while binding or serving.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}
