//! Client and server event enums.
//!
//! Events are adjacently tagged: `{"event": "<name>", "data": <payload>}`.
//! Single-value payloads (an authenticating user id, a presence transition)
//! carry the value directly in `data`; everything else is a `camelCase`
//! object.
//!
//! ```json
//! {"event": "authenticate", "data": "user_42"}
//! {"event": "direct:typing", "data": {"userId": "user_42", "otherUserId": "user_7", "isTyping": true}}
//! ```
//!
//! The enums are closed: the router dispatches exhaustively over
//! [`ClientEvent`], so adding a variant forces every handler site to be
//! revisited at compile time.

use serde::{Deserialize, Serialize};

use crate::{
    envelope::{DirectEnvelope, GroupEnvelope},
    errors::{ProtocolError, Result},
    ids::{GroupId, UserId},
};

/// Events a client may send to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Bind a user identity to this connection.
    ///
    /// Must be the first event on a connection; everything else is dropped
    /// until the binding exists. The binding is write-once.
    #[serde(rename = "authenticate")]
    Authenticate(UserId),

    /// Join the direct room shared with another user.
    #[serde(rename = "direct:join", rename_all = "camelCase")]
    DirectJoin {
        /// Identity the client believes it holds (informational; routing
        /// uses the authenticated binding).
        user_id: UserId,
        /// The peer to share a room with.
        other_user_id: UserId,
    },

    /// Relay a direct message to its room.
    #[serde(rename = "direct:message")]
    DirectMessage(DirectEnvelope),

    /// Announce a typing-state change to a direct peer.
    #[serde(rename = "direct:typing", rename_all = "camelCase")]
    DirectTyping {
        /// Identity the client believes it holds (informational).
        user_id: UserId,
        /// The peer being typed at.
        other_user_id: UserId,
        /// Whether the user is currently typing.
        is_typing: bool,
    },

    /// Join a group room.
    #[serde(rename = "group:join", rename_all = "camelCase")]
    GroupJoin {
        /// Group to join.
        group_id: GroupId,
        /// Identity the client believes it holds (informational).
        user_id: UserId,
    },

    /// Leave a group room.
    #[serde(rename = "group:leave", rename_all = "camelCase")]
    GroupLeave {
        /// Group to leave.
        group_id: GroupId,
        /// Identity the client believes it holds (informational).
        user_id: UserId,
    },

    /// Relay a group message to its room.
    #[serde(rename = "group:message")]
    GroupMessage(GroupEnvelope),

    /// Announce a typing-state change to a group.
    #[serde(rename = "group:typing", rename_all = "camelCase")]
    GroupTyping {
        /// Group being typed at.
        group_id: GroupId,
        /// Identity the client believes it holds (informational).
        user_id: UserId,
        /// Whether the user is currently typing.
        is_typing: bool,
    },
}

impl ClientEvent {
    /// Decode an event from a JSON text frame.
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    /// Check semantic requirements the type system cannot express.
    ///
    /// Decoding guarantees shape; this guarantees no required identity or
    /// message content is the empty string.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Authenticate(user_id) => require(user_id, "userId"),
            Self::DirectJoin { user_id, other_user_id } => {
                require(user_id, "userId")?;
                require(other_user_id, "otherUserId")
            },
            Self::DirectMessage(envelope) => envelope.validate(),
            Self::DirectTyping { user_id, other_user_id, .. } => {
                require(user_id, "userId")?;
                require(other_user_id, "otherUserId")
            },
            Self::GroupJoin { group_id, user_id } | Self::GroupLeave { group_id, user_id } => {
                require_group(group_id)?;
                require(user_id, "userId")
            },
            Self::GroupMessage(envelope) => envelope.validate(),
            Self::GroupTyping { group_id, user_id, .. } => {
                require_group(group_id)?;
                require(user_id, "userId")
            },
        }
    }

    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authenticate(_) => "authenticate",
            Self::DirectJoin { .. } => "direct:join",
            Self::DirectMessage(_) => "direct:message",
            Self::DirectTyping { .. } => "direct:typing",
            Self::GroupJoin { .. } => "group:join",
            Self::GroupLeave { .. } => "group:leave",
            Self::GroupMessage(_) => "group:message",
            Self::GroupTyping { .. } => "group:typing",
        }
    }
}

fn require(id: &UserId, field: &'static str) -> Result<()> {
    if id.is_empty() { Err(ProtocolError::EmptyField(field)) } else { Ok(()) }
}

fn require_group(id: &GroupId) -> Result<()> {
    if id.is_empty() { Err(ProtocolError::EmptyField("groupId")) } else { Ok(()) }
}

/// Events the relay pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A user came online (first bound connection).
    #[serde(rename = "user:online")]
    UserOnline(UserId),

    /// A user went offline (last bound connection closed).
    #[serde(rename = "user:offline")]
    UserOffline(UserId),

    /// Snapshot of currently-online users, sent on successful authenticate.
    #[serde(rename = "active_users")]
    ActiveUsers(Vec<UserId>),

    /// A relayed direct message.
    #[serde(rename = "direct:message")]
    DirectMessage(DirectEnvelope),

    /// A direct peer's typing state changed.
    #[serde(rename = "direct:typing", rename_all = "camelCase")]
    DirectTyping {
        /// The user who is (or stopped) typing.
        user_id: UserId,
        /// Whether they are currently typing.
        is_typing: bool,
    },

    /// A relayed group message.
    #[serde(rename = "group:message")]
    GroupMessage(GroupEnvelope),

    /// A group member's typing state changed.
    #[serde(rename = "group:typing", rename_all = "camelCase")]
    GroupTyping {
        /// The user who is (or stopped) typing.
        user_id: UserId,
        /// Whether they are currently typing.
        is_typing: bool,
    },

    /// A user joined the group room.
    #[serde(rename = "group:user_joined", rename_all = "camelCase")]
    GroupUserJoined {
        /// The user who joined.
        user_id: UserId,
        /// Server-stamped RFC 3339 time of the join.
        timestamp: String,
    },

    /// A user left the group room via an explicit leave.
    #[serde(rename = "group:user_left", rename_all = "camelCase")]
    GroupUserLeft {
        /// The user who left.
        user_id: UserId,
        /// Server-stamped RFC 3339 time of the leave.
        timestamp: String,
    },

    /// The relay rejected the sender's last event.
    #[serde(rename = "error", rename_all = "camelCase")]
    Error {
        /// Human-readable rejection reason.
        message: String,
    },
}

impl ServerEvent {
    /// Encode the event as a JSON text frame.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserOnline(_) => "user:online",
            Self::UserOffline(_) => "user:offline",
            Self::ActiveUsers(_) => "active_users",
            Self::DirectMessage(_) => "direct:message",
            Self::DirectTyping { .. } => "direct:typing",
            Self::GroupMessage(_) => "group:message",
            Self::GroupTyping { .. } => "group:typing",
            Self::GroupUserJoined { .. } => "group:user_joined",
            Self::GroupUserLeft { .. } => "group:user_left",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_authenticate_with_bare_string_payload() {
        let event = ClientEvent::from_json(r#"{"event":"authenticate","data":"user_42"}"#).unwrap();
        assert_eq!(event, ClientEvent::Authenticate(UserId::from("user_42")));
    }

    #[test]
    fn decodes_direct_join() {
        let event = ClientEvent::from_json(
            r#"{"event":"direct:join","data":{"userId":"alice","otherUserId":"bob"}}"#,
        )
        .unwrap();
        assert_eq!(event, ClientEvent::DirectJoin {
            user_id: UserId::from("alice"),
            other_user_id: UserId::from("bob"),
        });
    }

    #[test]
    fn decodes_direct_message_without_durable_id() {
        let event = ClientEvent::from_json(
            r#"{"event":"direct:message","data":{"senderId":"alice","receiverId":"bob","content":"hi","timestamp":"2024-01-15T10:30:00.000Z"}}"#,
        )
        .unwrap();

        let ClientEvent::DirectMessage(envelope) = event else {
            panic!("expected direct:message");
        };
        assert_eq!(envelope.id, None);
        assert_eq!(envelope.content, "hi");
    }

    #[test]
    fn decodes_group_typing() {
        let event = ClientEvent::from_json(
            r#"{"event":"group:typing","data":{"groupId":"g1","userId":"alice","isTyping":true}}"#,
        )
        .unwrap();
        assert_eq!(event, ClientEvent::GroupTyping {
            group_id: GroupId::from("g1"),
            user_id: UserId::from("alice"),
            is_typing: true,
        });
    }

    #[test]
    fn unknown_event_name_is_rejected() {
        let err = ClientEvent::from_json(r#"{"event":"shutdown","data":null}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn missing_field_is_rejected_at_decode() {
        // direct:join without otherUserId
        let err = ClientEvent::from_json(r#"{"event":"direct:join","data":{"userId":"alice"}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn empty_identity_is_rejected_at_validate() {
        let event = ClientEvent::from_json(r#"{"event":"authenticate","data":""}"#).unwrap();
        assert_eq!(event.validate(), Err(ProtocolError::EmptyField("userId")));
    }

    #[test]
    fn empty_group_id_is_rejected_at_validate() {
        let event = ClientEvent::GroupJoin {
            group_id: GroupId::from(""),
            user_id: UserId::from("alice"),
        };
        assert_eq!(event.validate(), Err(ProtocolError::EmptyField("groupId")));
    }

    #[test]
    fn encodes_presence_transition_as_bare_string() {
        let json = ServerEvent::UserOnline(UserId::from("alice")).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, json!({"event": "user:online", "data": "alice"}));
    }

    #[test]
    fn encodes_roster_snapshot_as_array() {
        let event = ServerEvent::ActiveUsers(vec![UserId::from("alice"), UserId::from("bob")]);
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"event": "active_users", "data": ["alice", "bob"]}));
    }

    #[test]
    fn encodes_typing_with_camel_case_fields() {
        let event =
            ServerEvent::DirectTyping { user_id: UserId::from("alice"), is_typing: false };
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({
            "event": "direct:typing",
            "data": {"userId": "alice", "isTyping": false}
        }));
    }

    #[test]
    fn encodes_group_join_notice_with_timestamp() {
        let event = ServerEvent::GroupUserJoined {
            user_id: UserId::from("bob"),
            timestamp: "2024-01-15T10:30:00.000Z".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({
            "event": "group:user_joined",
            "data": {"userId": "bob", "timestamp": "2024-01-15T10:30:00.000Z"}
        }));
    }

    #[test]
    fn relayed_envelope_round_trips_through_both_enums() {
        let inbound = ClientEvent::from_json(
            r#"{"event":"group:message","data":{"id":"msg_9","groupId":"g1","senderId":"alice","content":"hello all","timestamp":"2024-01-15T10:30:00.000Z"}}"#,
        )
        .unwrap();

        let ClientEvent::GroupMessage(envelope) = inbound else {
            panic!("expected group:message");
        };

        let outbound = ServerEvent::GroupMessage(envelope).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&outbound).unwrap();
        assert_eq!(value["event"], "group:message");
        assert_eq!(value["data"]["id"], "msg_9");
        assert_eq!(value["data"]["content"], "hello all");
    }

    #[test]
    fn event_names_match_wire_tags() {
        let event = ClientEvent::Authenticate(UserId::from("u"));
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(value["event"], event.name());

        let event = ServerEvent::Error { message: "nope".to_string() };
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["event"], event.name());
    }
}
