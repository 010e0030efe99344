//! Protocol error types.
//!
//! These cover the two ways a client frame can be bad: it fails to decode at
//! all, or it decodes but violates a semantic requirement (an empty identity,
//! empty message content). Encoding failures exist for completeness; with the
//! types in this crate they indicate a bug, not bad input.

use thiserror::Error;

/// Errors from decoding, validating, or encoding protocol events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Input was not a recognizable event.
    ///
    /// Covers invalid JSON, unknown event names, and missing/mistyped
    /// fields. The offending frame is dropped; the connection survives.
    #[error("malformed event: {0}")]
    Decode(String),

    /// Event decoded but a required field is empty.
    ///
    /// Carries the wire-facing field name so the rejection can be reported
    /// back to the sender verbatim.
    #[error("missing or empty field: {0}")]
    EmptyField(&'static str),

    /// Event could not be serialized to JSON.
    #[error("encode failure: {0}")]
    Encode(String),
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
