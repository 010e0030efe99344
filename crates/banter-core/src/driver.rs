//! Relay driver.
//!
//! Ties together the presence registry (identity bindings), the room
//! registry (membership), and event routing. The driver owns no sockets:
//! the transport runtime feeds it [`RelayEvent`]s and executes the
//! [`RelayAction`]s it returns.

use std::collections::HashSet;

use banter_proto::{ClientEvent, DirectEnvelope, GroupEnvelope, GroupId, ServerEvent, UserId};

use crate::connection::ConnectionId;
use crate::env::Environment;
use crate::membership::RoomRegistry;
use crate::presence::{BindOutcome, PresenceRegistry, UnbindOutcome};
use crate::room::RoomId;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { max_connections: 10_000 }
    }
}

/// Events that the relay driver processes.
///
/// These are produced by the external runtime (tests or production).
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// A new connection was accepted.
    ConnectionOpened {
        /// Unique connection ID assigned by the runtime.
        connection_id: ConnectionId,
    },

    /// A decoded client event arrived on a connection.
    EventReceived {
        /// Connection that sent the event.
        connection_id: ConnectionId,
        /// The decoded event.
        event: ClientEvent,
    },

    /// A connection was closed (by peer or error).
    ConnectionClosed {
        /// Connection that was closed.
        connection_id: ConnectionId,
        /// Reason for closure.
        reason: String,
    },
}

/// Actions that the relay driver produces.
///
/// These are executed by runtime-specific code (production or tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    /// Send an event to a set of connections.
    Deliver {
        /// Target connections. Resolved against registry state at the moment
        /// the triggering event was processed.
        targets: Vec<ConnectionId>,
        /// Event to send.
        event: ServerEvent,
    },

    /// Close a connection.
    Disconnect {
        /// Connection to close.
        connection_id: ConnectionId,
        /// Reason for closure.
        reason: String,
    },
}

/// Action-based relay driver.
///
/// Orchestrates presence bindings, room membership, and event routing.
/// Recipient sets are resolved inside [`process_event`], so an action list
/// stays consistent with the registry state that produced it even if
/// registries change before the actions are executed.
///
/// [`process_event`]: RelayDriver::process_event
pub struct RelayDriver<E: Environment> {
    /// Open connections, authenticated or not.
    connections: HashSet<ConnectionId>,
    /// User identity bindings.
    presence: PresenceRegistry,
    /// Room membership.
    rooms: RoomRegistry,
    /// Environment (time, RNG).
    env: E,
    /// Relay configuration.
    config: RelayConfig,
}

impl<E: Environment> RelayDriver<E> {
    /// Create a new relay driver.
    pub fn new(env: E, config: RelayConfig) -> Self {
        Self {
            connections: HashSet::new(),
            presence: PresenceRegistry::new(),
            rooms: RoomRegistry::new(),
            env,
            config,
        }
    }

    /// Process a relay event and return actions to execute.
    ///
    /// This is the main entry point for the driver. It never fails:
    /// malformed or out-of-order client traffic is answered with an error
    /// event or dropped with a log line, and the registries stay consistent
    /// either way.
    pub fn process_event(&mut self, event: RelayEvent) -> Vec<RelayAction> {
        match event {
            RelayEvent::ConnectionOpened { connection_id } => {
                self.handle_connection_opened(connection_id)
            },
            RelayEvent::EventReceived { connection_id, event } => {
                self.handle_event_received(connection_id, event)
            },
            RelayEvent::ConnectionClosed { connection_id, reason } => {
                self.handle_connection_closed(connection_id, &reason)
            },
        }
    }

    /// Handle a new connection being accepted.
    fn handle_connection_opened(&mut self, connection_id: ConnectionId) -> Vec<RelayAction> {
        if self.connections.len() >= self.config.max_connections {
            tracing::warn!("rejecting connection {}: max connections exceeded", connection_id);
            return vec![RelayAction::Disconnect {
                connection_id,
                reason: "max connections exceeded".to_string(),
            }];
        }

        self.connections.insert(connection_id);
        tracing::debug!("connection {} opened", connection_id);
        Vec::new()
    }

    /// Handle a client event received on a connection.
    fn handle_event_received(
        &mut self,
        connection_id: ConnectionId,
        event: ClientEvent,
    ) -> Vec<RelayAction> {
        if !self.connections.contains(&connection_id) {
            tracing::warn!(
                "dropping {} event from unknown connection {}",
                event.name(),
                connection_id
            );
            return Vec::new();
        }

        if let Err(e) = event.validate() {
            tracing::warn!(
                "rejecting {} event from connection {}: {}",
                event.name(),
                connection_id,
                e
            );
            return vec![self.error_to(connection_id, e.to_string())];
        }

        match event {
            ClientEvent::Authenticate(user_id) => self.handle_authenticate(connection_id, user_id),
            ClientEvent::DirectJoin { user_id, other_user_id } => {
                self.handle_direct_join(connection_id, &user_id, other_user_id)
            },
            ClientEvent::DirectMessage(envelope) => {
                self.handle_direct_message(connection_id, envelope)
            },
            ClientEvent::DirectTyping { user_id, other_user_id, is_typing } => {
                self.handle_direct_typing(connection_id, &user_id, other_user_id, is_typing)
            },
            ClientEvent::GroupJoin { group_id, user_id } => {
                self.handle_group_join(connection_id, group_id, &user_id)
            },
            ClientEvent::GroupLeave { group_id, user_id } => {
                self.handle_group_leave(connection_id, group_id, &user_id)
            },
            ClientEvent::GroupMessage(envelope) => {
                self.handle_group_message(connection_id, envelope)
            },
            ClientEvent::GroupTyping { group_id, user_id, is_typing } => {
                self.handle_group_typing(connection_id, group_id, &user_id, is_typing)
            },
        }
    }

    /// Handle an authenticate event binding a user identity.
    fn handle_authenticate(
        &mut self,
        connection_id: ConnectionId,
        user_id: UserId,
    ) -> Vec<RelayAction> {
        match self.presence.bind(connection_id, user_id.clone()) {
            BindOutcome::WentOnline => {
                tracing::info!("user {} online via connection {}", user_id, connection_id);

                let mut actions = Vec::new();
                let others: Vec<ConnectionId> = self
                    .connections
                    .iter()
                    .copied()
                    .filter(|other| *other != connection_id)
                    .collect();
                if !others.is_empty() {
                    actions.push(RelayAction::Deliver {
                        targets: others,
                        event: ServerEvent::UserOnline(user_id),
                    });
                }
                actions.push(self.roster_snapshot(connection_id));
                actions
            },
            BindOutcome::AlreadyOnline => {
                tracing::debug!("user {} bound additional connection {}", user_id, connection_id);
                vec![self.roster_snapshot(connection_id)]
            },
            BindOutcome::AlreadyBound => {
                tracing::debug!("connection {} re-authenticated as {}", connection_id, user_id);
                Vec::new()
            },
            BindOutcome::Rejected { bound } => {
                tracing::warn!(
                    "connection {} tried to re-authenticate as {} but is bound to {}",
                    connection_id,
                    user_id,
                    bound
                );
                vec![self.error_to(
                    connection_id,
                    format!("connection is already authenticated as {}", bound),
                )]
            },
        }
    }

    /// Handle a direct-conversation join.
    fn handle_direct_join(
        &mut self,
        connection_id: ConnectionId,
        claimed: &UserId,
        other_user_id: UserId,
    ) -> Vec<RelayAction> {
        let bound = match self.require_identity(connection_id, "direct:join") {
            Ok(user_id) => user_id,
            Err(action) => return vec![action],
        };
        self.note_identity_mismatch(connection_id, "direct:join", claimed, &bound);

        let room_id = RoomId::direct(bound, other_user_id);
        self.rooms.join(room_id.clone(), connection_id);
        tracing::debug!("connection {} joined {}", connection_id, room_id);
        Vec::new()
    }

    /// Handle a direct message, fanning out to both sides of the
    /// conversation.
    fn handle_direct_message(
        &mut self,
        connection_id: ConnectionId,
        envelope: DirectEnvelope,
    ) -> Vec<RelayAction> {
        let bound = match self.require_identity(connection_id, "direct:message") {
            Ok(user_id) => user_id,
            Err(action) => return vec![action],
        };
        self.note_identity_mismatch(connection_id, "direct:message", &envelope.sender_id, &bound);

        // Routed by the envelope's pair so the conversation room matches the
        // one the receiver joined.
        let room_id = RoomId::direct(envelope.sender_id.clone(), envelope.receiver_id.clone());
        self.deliver_to_room(&room_id, None, ServerEvent::DirectMessage(envelope))
    }

    /// Handle a direct typing indicator.
    fn handle_direct_typing(
        &mut self,
        connection_id: ConnectionId,
        claimed: &UserId,
        other_user_id: UserId,
        is_typing: bool,
    ) -> Vec<RelayAction> {
        let bound = match self.require_identity(connection_id, "direct:typing") {
            Ok(user_id) => user_id,
            Err(action) => return vec![action],
        };
        self.note_identity_mismatch(connection_id, "direct:typing", claimed, &bound);

        let room_id = RoomId::direct(bound.clone(), other_user_id);
        self.deliver_to_room(
            &room_id,
            Some(connection_id),
            ServerEvent::DirectTyping { user_id: bound, is_typing },
        )
    }

    /// Handle a group join, announcing the arrival to existing members.
    fn handle_group_join(
        &mut self,
        connection_id: ConnectionId,
        group_id: GroupId,
        claimed: &UserId,
    ) -> Vec<RelayAction> {
        let bound = match self.require_identity(connection_id, "group:join") {
            Ok(user_id) => user_id,
            Err(action) => return vec![action],
        };
        self.note_identity_mismatch(connection_id, "group:join", claimed, &bound);

        let room_id = RoomId::group(group_id);
        if !self.rooms.join(room_id.clone(), connection_id) {
            // Rejoin after a reconnect race; members already saw the arrival.
            tracing::debug!("connection {} already in {}", connection_id, room_id);
            return Vec::new();
        }
        tracing::debug!("connection {} joined {}", connection_id, room_id);

        self.deliver_to_room(
            &room_id,
            Some(connection_id),
            ServerEvent::GroupUserJoined { user_id: bound, timestamp: self.env.timestamp() },
        )
    }

    /// Handle a group leave, announcing the departure to remaining members.
    fn handle_group_leave(
        &mut self,
        connection_id: ConnectionId,
        group_id: GroupId,
        claimed: &UserId,
    ) -> Vec<RelayAction> {
        let bound = match self.require_identity(connection_id, "group:leave") {
            Ok(user_id) => user_id,
            Err(action) => return vec![action],
        };
        self.note_identity_mismatch(connection_id, "group:leave", claimed, &bound);

        let room_id = RoomId::group(group_id);
        if !self.rooms.leave(&room_id, connection_id) {
            tracing::debug!("connection {} left {} it never joined", connection_id, room_id);
            return Vec::new();
        }
        tracing::debug!("connection {} left {}", connection_id, room_id);

        self.deliver_to_room(
            &room_id,
            None,
            ServerEvent::GroupUserLeft { user_id: bound, timestamp: self.env.timestamp() },
        )
    }

    /// Handle a group message, fanning out to every member.
    fn handle_group_message(
        &mut self,
        connection_id: ConnectionId,
        envelope: GroupEnvelope,
    ) -> Vec<RelayAction> {
        let bound = match self.require_identity(connection_id, "group:message") {
            Ok(user_id) => user_id,
            Err(action) => return vec![action],
        };
        self.note_identity_mismatch(connection_id, "group:message", &envelope.sender_id, &bound);

        let room_id = RoomId::group(envelope.group_id.clone());
        self.deliver_to_room(&room_id, None, ServerEvent::GroupMessage(envelope))
    }

    /// Handle a group typing indicator.
    fn handle_group_typing(
        &mut self,
        connection_id: ConnectionId,
        group_id: GroupId,
        claimed: &UserId,
        is_typing: bool,
    ) -> Vec<RelayAction> {
        let bound = match self.require_identity(connection_id, "group:typing") {
            Ok(user_id) => user_id,
            Err(action) => return vec![action],
        };
        self.note_identity_mismatch(connection_id, "group:typing", claimed, &bound);

        let room_id = RoomId::group(group_id);
        self.deliver_to_room(
            &room_id,
            Some(connection_id),
            ServerEvent::GroupTyping { user_id: bound, is_typing },
        )
    }

    /// Handle a connection being closed.
    ///
    /// Duplicate notifications for the same connection are no-ops, so close
    /// races between the peer, the idle sweep, and transport errors are
    /// harmless.
    fn handle_connection_closed(
        &mut self,
        connection_id: ConnectionId,
        reason: &str,
    ) -> Vec<RelayAction> {
        if !self.connections.remove(&connection_id) {
            return Vec::new();
        }

        let vacated = self.rooms.leave_all(connection_id);
        let mut actions = Vec::new();

        match self.presence.unbind(connection_id) {
            Some(UnbindOutcome::WentOffline(user_id)) => {
                tracing::info!(
                    "connection {} closed: {}, user {} offline, left {} rooms",
                    connection_id,
                    reason,
                    user_id,
                    vacated.len()
                );
                let targets: Vec<ConnectionId> = self.connections.iter().copied().collect();
                if !targets.is_empty() {
                    actions.push(RelayAction::Deliver {
                        targets,
                        event: ServerEvent::UserOffline(user_id),
                    });
                }
            },
            Some(UnbindOutcome::StillOnline(user_id)) => {
                tracing::info!(
                    "connection {} closed: {}, user {} still online elsewhere",
                    connection_id,
                    reason,
                    user_id
                );
            },
            None => {
                tracing::debug!(
                    "connection {} closed before authenticating: {}",
                    connection_id,
                    reason
                );
            },
        }

        actions
    }

    /// Bound identity for a connection, or the error action to send when the
    /// event requires one and the connection never authenticated.
    fn require_identity(
        &self,
        connection_id: ConnectionId,
        event_name: &str,
    ) -> Result<UserId, RelayAction> {
        match self.presence.user_of(connection_id) {
            Some(user_id) => Ok(user_id.clone()),
            None => {
                tracing::warn!(
                    "rejecting {} from unauthenticated connection {}",
                    event_name,
                    connection_id
                );
                Err(self.error_to(connection_id, "authentication required".to_string()))
            },
        }
    }

    /// Client payloads carry the sender's claimed id; routing trusts the
    /// bound identity instead.
    fn note_identity_mismatch(
        &self,
        connection_id: ConnectionId,
        event_name: &str,
        claimed: &UserId,
        bound: &UserId,
    ) {
        if claimed != bound {
            tracing::debug!(
                "{} from connection {} claims {} but is bound to {}",
                event_name,
                connection_id,
                claimed,
                bound
            );
        }
    }

    /// Deliver an event to room members, optionally excluding the emitting
    /// connection. No action when the recipient set is empty.
    fn deliver_to_room(
        &self,
        room_id: &RoomId,
        exclude: Option<ConnectionId>,
        event: ServerEvent,
    ) -> Vec<RelayAction> {
        let targets: Vec<ConnectionId> = self
            .rooms
            .members_of(room_id)
            .filter(|member| Some(*member) != exclude)
            .collect();
        if targets.is_empty() {
            return Vec::new();
        }
        vec![RelayAction::Deliver { targets, event }]
    }

    /// Sorted roster of online users, addressed to one connection.
    fn roster_snapshot(&self, connection_id: ConnectionId) -> RelayAction {
        let mut users: Vec<UserId> = self.presence.online_users().cloned().collect();
        users.sort();
        RelayAction::Deliver { targets: vec![connection_id], event: ServerEvent::ActiveUsers(users) }
    }

    /// Error event addressed to one connection.
    fn error_to(&self, connection_id: ConnectionId, message: String) -> RelayAction {
        RelayAction::Deliver { targets: vec![connection_id], event: ServerEvent::Error { message } }
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of currently-online users.
    pub fn online_user_count(&self) -> usize {
        self.presence.online_user_count()
    }

    /// True iff the user has at least one authenticated connection.
    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.presence.is_online(user_id)
    }

    /// Identity bound to a connection. `None` while unauthenticated.
    pub fn user_of(&self, connection_id: ConnectionId) -> Option<&UserId> {
        self.presence.user_of(connection_id)
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.rooms.room_count()
    }

    /// True iff the connection is currently a member of the room.
    pub fn is_member(&self, room_id: &RoomId, connection_id: ConnectionId) -> bool {
        self.rooms.is_member(room_id, connection_id)
    }
}

impl<E: Environment> std::fmt::Debug for RelayDriver<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayDriver")
            .field("connection_count", &self.connections.len())
            .field("online_user_count", &self.presence.online_user_count())
            .field("room_count", &self.rooms.room_count())
            .finish()
    }
}
