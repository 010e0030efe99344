//! Message envelopes.
//!
//! The relay forwards envelopes verbatim: it validates structure, resolves
//! recipients, and copies the payload through. Persistence happens in the
//! surrounding request path before the event reaches the relay, which is why
//! an envelope may already carry a durable `id` (clients use it to reconcile
//! their own echo).

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    ids::{GroupId, UserId},
};

/// A direct (two-party) message in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectEnvelope {
    /// Durable message id assigned by the persistence path, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Author of the message.
    pub sender_id: UserId,
    /// Intended recipient.
    pub receiver_id: UserId,
    /// Message text.
    pub content: String,
    /// Creation timestamp, forwarded as an opaque string.
    pub timestamp: String,
}

impl DirectEnvelope {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.sender_id.is_empty() {
            return Err(ProtocolError::EmptyField("senderId"));
        }
        if self.receiver_id.is_empty() {
            return Err(ProtocolError::EmptyField("receiverId"));
        }
        if self.content.is_empty() {
            return Err(ProtocolError::EmptyField("content"));
        }
        Ok(())
    }
}

/// A group message in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEnvelope {
    /// Durable message id assigned by the persistence path, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Group the message belongs to.
    pub group_id: GroupId,
    /// Author of the message.
    pub sender_id: UserId,
    /// Message text.
    pub content: String,
    /// Creation timestamp, forwarded as an opaque string.
    pub timestamp: String,
}

impl GroupEnvelope {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.group_id.is_empty() {
            return Err(ProtocolError::EmptyField("groupId"));
        }
        if self.sender_id.is_empty() {
            return Err(ProtocolError::EmptyField("senderId"));
        }
        if self.content.is_empty() {
            return Err(ProtocolError::EmptyField("content"));
        }
        Ok(())
    }
}
