//! Room membership: which connections are subscribed to which rooms.
//!
//! Membership is tracked per connection, not per user, so each device joins
//! and leaves rooms independently. The registry keeps a reverse index so a
//! closing connection can be swept out of every room it joined in one pass.
//! Rooms have no standalone existence: one appears when its first member
//! joins and vanishes when its last member leaves.

use std::collections::{HashMap, HashSet};

use crate::connection::ConnectionId;
use crate::room::RoomId;

/// Registry of room ↔ connection subscriptions.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// Room → member connections. Sets are never empty; the entry is removed
    /// when the last member leaves.
    room_members: HashMap<RoomId, HashSet<ConnectionId>>,
    /// Connection → joined rooms (reverse index for `leave_all`).
    connection_rooms: HashMap<ConnectionId, HashSet<RoomId>>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a room.
    ///
    /// Returns `true` if the connection was not already a member.
    pub fn join(&mut self, room_id: RoomId, connection_id: ConnectionId) -> bool {
        let newly_joined =
            self.room_members.entry(room_id.clone()).or_default().insert(connection_id);
        if newly_joined {
            self.connection_rooms.entry(connection_id).or_default().insert(room_id);
        }
        newly_joined
    }

    /// Remove a connection from a room.
    ///
    /// Returns `true` if the connection was a member. Non-members are a
    /// no-op, not an error.
    pub fn leave(&mut self, room_id: &RoomId, connection_id: ConnectionId) -> bool {
        let Some(members) = self.room_members.get_mut(room_id) else {
            return false;
        };
        let was_member = members.remove(&connection_id);
        if members.is_empty() {
            self.room_members.remove(room_id);
        }

        if was_member {
            if let Some(rooms) = self.connection_rooms.get_mut(&connection_id) {
                rooms.remove(room_id);
                if rooms.is_empty() {
                    self.connection_rooms.remove(&connection_id);
                }
            }
        }
        was_member
    }

    /// Remove a connection from every room it joined.
    ///
    /// Returns the vacated rooms so the caller can notify remaining members.
    pub fn leave_all(&mut self, connection_id: ConnectionId) -> Vec<RoomId> {
        let Some(rooms) = self.connection_rooms.remove(&connection_id) else {
            return Vec::new();
        };

        let mut vacated = Vec::with_capacity(rooms.len());
        for room_id in rooms {
            if let Some(members) = self.room_members.get_mut(&room_id) {
                members.remove(&connection_id);
                if members.is_empty() {
                    self.room_members.remove(&room_id);
                }
            }
            vacated.push(room_id);
        }
        vacated
    }

    /// True iff the connection is currently a member of the room.
    pub fn is_member(&self, room_id: &RoomId, connection_id: ConnectionId) -> bool {
        self.room_members.get(room_id).is_some_and(|members| members.contains(&connection_id))
    }

    /// Member connections of a room, in unspecified order. Empty for unknown
    /// rooms.
    pub fn members_of(&self, room_id: &RoomId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.room_members.get(room_id).into_iter().flatten().copied()
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.room_members.len()
    }

    /// Number of members in a room. Zero for unknown rooms.
    pub fn member_count(&self, room_id: &RoomId) -> usize {
        self.room_members.get(room_id).map_or(0, HashSet::len)
    }
}
