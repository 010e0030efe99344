//! Banter relay core.
//!
//! Sans-IO logic for the presence-and-room relay: who is online, which
//! connections share which rooms, and where each inbound event fans out.
//! Nothing in this crate touches a socket; the [`driver::RelayDriver`]
//! consumes [`driver::RelayEvent`]s and returns [`driver::RelayAction`]s for
//! a runtime (production or test harness) to execute.
//!
//! # Components
//!
//! - [`env::Environment`]: time and randomness abstraction, injectable in
//!   tests
//! - [`presence::PresenceRegistry`]: user identity ↔ connection bindings and
//!   online/offline transitions
//! - [`membership::RoomRegistry`]: room ↔ connection membership with lazy
//!   creation and empty-room cleanup
//! - [`driver::RelayDriver`]: the event router tying the registries together

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod driver;
pub mod env;
pub mod membership;
pub mod presence;
pub mod room;
