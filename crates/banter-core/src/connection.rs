//! Connection identifiers.

use std::fmt;

/// Transport-assigned handle for one live client connection.
///
/// Minted by the transport server from environment randomness when a socket
/// is accepted; never exposed to clients. The 64-bit random space makes
/// reuse within a process lifetime a non-concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw connection id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
