//! Fuzz target for the relay driver's routing state
//!
//! Prevent presence/membership desync under hostile event sequences
//!
//! # Strategy
//!
//! - Arbitrary interleavings of opens, closes, and client events
//! - Colliding connection slots and reused user/group names
//! - Events from connections that were never opened or already closed
//! - Payloads that fail semantic validation (empty identities, empty
//!   content)
//!
//! # Invariants
//!
//! - Every Deliver targets only currently-open connections
//! - Deliveries never have an empty recipient set
//! - connection_count always matches the set of admitted connections
//! - online_user_count never exceeds connection_count
//! - Closing every connection empties presence and membership completely

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use banter_core::connection::ConnectionId;
use banter_core::driver::{RelayAction, RelayConfig, RelayDriver, RelayEvent};
use banter_core::env::Environment;
use banter_proto::{ClientEvent, DirectEnvelope, GroupEnvelope, GroupId, UserId};
use libfuzzer_sys::fuzz_target;

#[derive(Clone)]
struct FuzzEnv;

impl Environment for FuzzEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn wall_clock_ms(&self) -> u64 {
        1_700_000_000_000
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(0x5A);
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct RelayScenario {
    max_connections: u8,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Step {
    Open { slot: u8 },
    Close { slot: u8 },
    Authenticate { slot: u8, user: u8 },
    DirectJoin { slot: u8, other: u8 },
    DirectMessage { slot: u8, sender: u8, receiver: u8, empty_content: bool },
    DirectTyping { slot: u8, other: u8, is_typing: bool },
    GroupJoin { slot: u8, group: u8 },
    GroupLeave { slot: u8, group: u8 },
    GroupMessage { slot: u8, group: u8, sender: u8, empty_content: bool },
    GroupTyping { slot: u8, group: u8, is_typing: bool },
}

// Small id spaces force collisions: shared devices, rejoined groups,
// conversations from both ends.
fn user(id: u8) -> UserId {
    UserId::from(format!("user-{}", id % 8))
}

fn group(id: u8) -> GroupId {
    GroupId::from(format!("group-{}", id % 4))
}

fn connection(slot: u8) -> ConnectionId {
    ConnectionId::new(u64::from(slot % 16))
}

fn content(empty: bool) -> String {
    if empty { String::new() } else { "fuzz".to_string() }
}

const STAMP: &str = "2023-11-14T22:13:20.000Z";

fuzz_target!(|scenario: RelayScenario| {
    let config = RelayConfig { max_connections: usize::from(scenario.max_connections % 32) + 1 };
    let mut driver = RelayDriver::new(FuzzEnv, config);
    let mut open: HashSet<ConnectionId> = HashSet::new();

    for step in scenario.steps {
        let (connection_id, event) = match step {
            Step::Open { slot } => {
                let connection_id = connection(slot);
                let actions =
                    driver.process_event(RelayEvent::ConnectionOpened { connection_id });
                let rejected = actions
                    .iter()
                    .any(|action| matches!(action, RelayAction::Disconnect { .. }));
                if !rejected {
                    open.insert(connection_id);
                }
                check_actions(&actions, &open);
                check_counts(&driver, &open);
                continue;
            },
            Step::Close { slot } => {
                let connection_id = connection(slot);
                open.remove(&connection_id);
                let actions = driver.process_event(RelayEvent::ConnectionClosed {
                    connection_id,
                    reason: "fuzz close".to_string(),
                });
                check_actions(&actions, &open);
                check_counts(&driver, &open);
                continue;
            },
            Step::Authenticate { slot, user: id } => {
                (connection(slot), ClientEvent::Authenticate(user(id)))
            },
            Step::DirectJoin { slot, other } => (connection(slot), ClientEvent::DirectJoin {
                user_id: user(slot),
                other_user_id: user(other),
            }),
            Step::DirectMessage { slot, sender, receiver, empty_content } => {
                (connection(slot), ClientEvent::DirectMessage(DirectEnvelope {
                    id: None,
                    sender_id: user(sender),
                    receiver_id: user(receiver),
                    content: content(empty_content),
                    timestamp: STAMP.to_string(),
                }))
            },
            Step::DirectTyping { slot, other, is_typing } => {
                (connection(slot), ClientEvent::DirectTyping {
                    user_id: user(slot),
                    other_user_id: user(other),
                    is_typing,
                })
            },
            Step::GroupJoin { slot, group: id } => (connection(slot), ClientEvent::GroupJoin {
                group_id: group(id),
                user_id: user(slot),
            }),
            Step::GroupLeave { slot, group: id } => (connection(slot), ClientEvent::GroupLeave {
                group_id: group(id),
                user_id: user(slot),
            }),
            Step::GroupMessage { slot, group: id, sender, empty_content } => {
                (connection(slot), ClientEvent::GroupMessage(GroupEnvelope {
                    id: None,
                    group_id: group(id),
                    sender_id: user(sender),
                    content: content(empty_content),
                    timestamp: STAMP.to_string(),
                }))
            },
            Step::GroupTyping { slot, group: id, is_typing } => {
                (connection(slot), ClientEvent::GroupTyping {
                    group_id: group(id),
                    user_id: user(slot),
                    is_typing,
                })
            },
        };

        let actions = driver.process_event(RelayEvent::EventReceived { connection_id, event });
        check_actions(&actions, &open);
        check_counts(&driver, &open);
    }

    // Draining every connection must leave no residue in any registry.
    let remaining: Vec<ConnectionId> = open.iter().copied().collect();
    for connection_id in remaining {
        driver.process_event(RelayEvent::ConnectionClosed {
            connection_id,
            reason: "drain".to_string(),
        });
    }
    assert_eq!(driver.connection_count(), 0);
    assert_eq!(driver.online_user_count(), 0);
    assert_eq!(driver.room_count(), 0);
});

fn check_actions(actions: &[RelayAction], open: &HashSet<ConnectionId>) {
    for action in actions {
        if let RelayAction::Deliver { targets, .. } = action {
            assert!(!targets.is_empty(), "delivery with no recipients");
            for target in targets {
                assert!(open.contains(target), "deliver target {target} is not open");
            }
        }
    }
}

fn check_counts(driver: &RelayDriver<FuzzEnv>, open: &HashSet<ConnectionId>) {
    assert_eq!(driver.connection_count(), open.len());
    assert!(driver.online_user_count() <= driver.connection_count());
}
