//! Banter wire protocol.
//!
//! Defines the JSON events exchanged between chat clients and the relay
//! server. Every frame on the wire is a single JSON object of the shape
//! `{"event": "<name>", "data": <payload>}`; the event name selects the
//! payload type.
//!
//! The protocol is intentionally small: clients authenticate, join rooms,
//! and send messages/typing notices; the server pushes presence transitions
//! and relayed envelopes back. Field names are `camelCase` because the
//! primary consumers are browser clients.
//!
//! This crate is pure data: no I/O, no routing decisions. Routing lives in
//! `banter-core`; sockets live in `banter-server`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod errors;
mod event;
mod ids;

pub use envelope::{DirectEnvelope, GroupEnvelope};
pub use errors::{ProtocolError, Result};
pub use event::{ClientEvent, ServerEvent};
pub use ids::{GroupId, UserId};
