//! Connection registry: user identity bindings and online/offline state.
//!
//! Maintains bidirectional mappings: user → bound connections (for presence)
//! and connection → user (for routing). A user is online iff at least one
//! connection is bound to them; [`BindOutcome`] and [`UnbindOutcome`] report
//! exactly when the empty/non-empty boundary is crossed so presence
//! broadcasts fire once per transition, never per connection.
//!
//! Bindings are write-once: a connection keeps its first authenticated
//! identity for its whole lifetime.

use std::collections::{HashMap, HashSet};

use banter_proto::UserId;

use crate::connection::ConnectionId;

/// Result of binding a user identity to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// First bound connection for this user; broadcast a presence-online
    /// transition.
    WentOnline,
    /// The user was already online through another connection; no broadcast.
    AlreadyOnline,
    /// This exact binding already exists; nothing changed.
    AlreadyBound,
    /// The connection is already bound to a different user. The original
    /// binding stands.
    Rejected {
        /// Identity the connection keeps.
        bound: UserId,
    },
}

/// Result of removing a connection's binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnbindOutcome {
    /// Last bound connection removed; broadcast a presence-offline
    /// transition for this user.
    WentOffline(UserId),
    /// The user remains online through other connections.
    StillOnline(UserId),
}

/// Registry of user ↔ connection bindings.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    /// User → connections currently bound to them. Sets are never empty;
    /// the entry is removed when the last connection unbinds.
    user_connections: HashMap<UserId, HashSet<ConnectionId>>,
    /// Connection → bound user (reverse index).
    connection_user: HashMap<ConnectionId, UserId>,
}

impl PresenceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a user identity to a connection.
    ///
    /// Idempotent for the same pair. Rebinding a connection to a different
    /// user is rejected; the original binding stands.
    pub fn bind(&mut self, connection_id: ConnectionId, user_id: UserId) -> BindOutcome {
        if let Some(bound) = self.connection_user.get(&connection_id) {
            if *bound == user_id {
                return BindOutcome::AlreadyBound;
            }
            return BindOutcome::Rejected { bound: bound.clone() };
        }

        let connections = self.user_connections.entry(user_id.clone()).or_default();
        let went_online = connections.is_empty();
        connections.insert(connection_id);
        self.connection_user.insert(connection_id, user_id);

        if went_online { BindOutcome::WentOnline } else { BindOutcome::AlreadyOnline }
    }

    /// Remove a connection's binding.
    ///
    /// Returns `None` if the connection was never bound (authenticate never
    /// ran); this is a no-op, not an error.
    pub fn unbind(&mut self, connection_id: ConnectionId) -> Option<UnbindOutcome> {
        let user_id = self.connection_user.remove(&connection_id)?;

        let went_offline = match self.user_connections.get_mut(&user_id) {
            Some(connections) => {
                connections.remove(&connection_id);
                connections.is_empty()
            },
            None => true,
        };

        if went_offline {
            self.user_connections.remove(&user_id);
            Some(UnbindOutcome::WentOffline(user_id))
        } else {
            Some(UnbindOutcome::StillOnline(user_id))
        }
    }

    /// True iff the user has at least one bound connection.
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.user_connections.contains_key(user_id)
    }

    /// Identity bound to a connection. `None` while unauthenticated.
    pub fn user_of(&self, connection_id: ConnectionId) -> Option<&UserId> {
        self.connection_user.get(&connection_id)
    }

    /// All currently-online users, in unspecified order.
    pub fn online_users(&self) -> impl Iterator<Item = &UserId> {
        self.user_connections.keys()
    }

    /// Number of currently-online users.
    pub fn online_user_count(&self) -> usize {
        self.user_connections.len()
    }

    /// Number of bound connections across all users.
    pub fn bound_connection_count(&self) -> usize {
        self.connection_user.len()
    }
}
