//! Room identifiers.
//!
//! A room is a pure in-memory fan-out set; its identifier encodes which of
//! the two room kinds it is. Direct rooms canonicalize their participant
//! pair on construction, so both peers derive the same id no matter who
//! joins first. Because the kind is part of the value, a direct id and a
//! group id can never collide, even for adversarial identity strings.

use std::fmt;

use banter_proto::{GroupId, UserId};

/// Identifier of an in-memory fan-out room.
///
/// Construct via [`RoomId::direct`] or [`RoomId::group`]; the constructors
/// enforce the canonical ordering invariant for direct rooms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(Variant);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Variant {
    /// Two-party conversation. Invariant: first participant <= second.
    Direct(UserId, UserId),
    /// Multi-party conversation keyed by an external group id.
    Group(GroupId),
}

impl RoomId {
    /// Room shared by an unordered pair of users.
    ///
    /// Symmetric: `direct(a, b) == direct(b, a)`.
    pub fn direct(a: UserId, b: UserId) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(Variant::Direct(first, second))
    }

    /// Room for a group conversation.
    pub fn group(group_id: GroupId) -> Self {
        Self(Variant::Group(group_id))
    }

    /// True for two-party rooms.
    pub fn is_direct(&self) -> bool {
        matches!(self.0, Variant::Direct(..))
    }

    /// True for group rooms.
    pub fn is_group(&self) -> bool {
        matches!(self.0, Variant::Group(_))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Variant::Direct(a, b) => write!(f, "dm-{a}-{b}"),
            Variant::Group(g) => write!(f, "group-{g}"),
        }
    }
}
