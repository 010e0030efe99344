//! End-to-end relay flows through the driver's public API.
//!
//! Single-transition behavior is covered by unit tests next to the driver;
//! these verify that state carried across steps (identity bindings, room
//! memberships, presence) keeps routing correct over whole conversations:
//! exchange, disconnect, reconnect, multi-device.

use banter_core::{
    connection::ConnectionId,
    driver::{RelayAction, RelayConfig, RelayDriver, RelayEvent},
    env::Environment,
};
use banter_proto::{ClientEvent, DirectEnvelope, GroupEnvelope, GroupId, ServerEvent, UserId};

#[derive(Clone)]
struct TestEnv;

impl Environment for TestEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn wall_clock_ms(&self) -> u64 {
        1_700_000_000_000
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        use rand::RngCore;
        rand::thread_rng().fill_bytes(buffer);
    }
}

fn relay() -> RelayDriver<TestEnv> {
    RelayDriver::new(TestEnv, RelayConfig::default())
}

/// Open a connection and authenticate it in one step.
fn connect(relay: &mut RelayDriver<TestEnv>, raw: u64, user: &str) -> ConnectionId {
    let connection_id = ConnectionId::new(raw);
    relay.process_event(RelayEvent::ConnectionOpened { connection_id });
    relay.process_event(RelayEvent::EventReceived {
        connection_id,
        event: ClientEvent::Authenticate(UserId::from(user)),
    });
    connection_id
}

fn send(
    relay: &mut RelayDriver<TestEnv>,
    connection_id: ConnectionId,
    event: ClientEvent,
) -> Vec<RelayAction> {
    relay.process_event(RelayEvent::EventReceived { connection_id, event })
}

fn close(relay: &mut RelayDriver<TestEnv>, connection_id: ConnectionId) -> Vec<RelayAction> {
    relay.process_event(RelayEvent::ConnectionClosed {
        connection_id,
        reason: "peer closed".to_string(),
    })
}

fn direct_join(user: &str, other: &str) -> ClientEvent {
    ClientEvent::DirectJoin {
        user_id: UserId::from(user),
        other_user_id: UserId::from(other),
    }
}

fn group_join(group: &str, user: &str) -> ClientEvent {
    ClientEvent::GroupJoin { group_id: GroupId::from(group), user_id: UserId::from(user) }
}

fn direct_message(sender: &str, receiver: &str, content: &str) -> ClientEvent {
    ClientEvent::DirectMessage(DirectEnvelope {
        id: None,
        sender_id: UserId::from(sender),
        receiver_id: UserId::from(receiver),
        content: content.to_string(),
        timestamp: "2024-01-15T10:30:00.000Z".to_string(),
    })
}

/// Flatten actions into (sorted targets, event) pairs for assertion.
fn delivered(actions: &[RelayAction]) -> Vec<(Vec<ConnectionId>, ServerEvent)> {
    actions
        .iter()
        .map(|action| match action {
            RelayAction::Deliver { targets, event } => {
                let mut sorted = targets.clone();
                sorted.sort();
                (sorted, event.clone())
            },
            RelayAction::Disconnect { .. } => panic!("expected Deliver, got {action:?}"),
        })
        .collect()
}

#[test]
fn two_users_exchange_messages_and_typing() {
    let mut relay = relay();
    let alice = connect(&mut relay, 1, "alice");
    let bob = connect(&mut relay, 2, "bob");
    send(&mut relay, alice, direct_join("alice", "bob"));
    send(&mut relay, bob, direct_join("bob", "alice"));

    // Messages echo to the sender's own connection as well.
    let actions = send(&mut relay, alice, direct_message("alice", "bob", "hey"));
    let (targets, event) = &delivered(&actions)[0];
    assert_eq!(*targets, vec![alice, bob]);
    assert!(matches!(event, ServerEvent::DirectMessage(envelope) if envelope.content == "hey"));

    let actions = send(&mut relay, bob, direct_message("bob", "alice", "hi back"));
    let (targets, _) = &delivered(&actions)[0];
    assert_eq!(*targets, vec![alice, bob]);

    // Typing indicators skip the typist.
    let actions = send(&mut relay, alice, ClientEvent::DirectTyping {
        user_id: UserId::from("alice"),
        other_user_id: UserId::from("bob"),
        is_typing: true,
    });
    assert_eq!(delivered(&actions), vec![(vec![bob], ServerEvent::DirectTyping {
        user_id: UserId::from("alice"),
        is_typing: true,
    })]);

    // Bob leaving tells alice exactly once.
    let actions = close(&mut relay, bob);
    assert_eq!(
        delivered(&actions),
        vec![(vec![alice], ServerEvent::UserOffline(UserId::from("bob")))]
    );
}

#[test]
fn reconnect_restores_presence_and_membership() {
    let mut relay = relay();
    let alice = connect(&mut relay, 1, "alice");
    let bob = connect(&mut relay, 2, "bob");
    send(&mut relay, alice, group_join("lobby", "alice"));
    send(&mut relay, bob, group_join("lobby", "bob"));

    let actions = close(&mut relay, alice);
    assert_eq!(
        delivered(&actions),
        vec![(vec![bob], ServerEvent::UserOffline(UserId::from("alice")))]
    );
    assert_eq!(relay.room_count(), 1);

    // Alice returns on a fresh connection.
    let alice2 = ConnectionId::new(3);
    relay.process_event(RelayEvent::ConnectionOpened { connection_id: alice2 });
    let actions = send(&mut relay, alice2, ClientEvent::Authenticate(UserId::from("alice")));
    assert_eq!(delivered(&actions), vec![
        (vec![bob], ServerEvent::UserOnline(UserId::from("alice"))),
        (
            vec![alice2],
            ServerEvent::ActiveUsers(vec![UserId::from("alice"), UserId::from("bob")])
        ),
    ]);

    // Rejoining announces the arrival to the remaining member.
    let actions = send(&mut relay, alice2, group_join("lobby", "alice"));
    let (targets, event) = &delivered(&actions)[0];
    assert_eq!(*targets, vec![bob]);
    assert!(matches!(
        event,
        ServerEvent::GroupUserJoined { user_id, .. } if *user_id == UserId::from("alice")
    ));

    let actions = send(&mut relay, alice2, ClientEvent::GroupMessage(GroupEnvelope {
        id: None,
        group_id: GroupId::from("lobby"),
        sender_id: UserId::from("alice"),
        content: "back".to_string(),
        timestamp: "2024-01-15T10:31:00.000Z".to_string(),
    }));
    let (targets, _) = &delivered(&actions)[0];
    assert_eq!(*targets, vec![bob, alice2]);
}

#[test]
fn multi_device_user_is_a_single_presence() {
    let mut relay = relay();
    let laptop = connect(&mut relay, 1, "alice");
    let phone = ConnectionId::new(2);
    relay.process_event(RelayEvent::ConnectionOpened { connection_id: phone });
    send(&mut relay, phone, ClientEvent::Authenticate(UserId::from("alice")));
    let bob = connect(&mut relay, 3, "bob");
    assert_eq!(relay.online_user_count(), 2);

    // Both devices and bob share the direct room.
    send(&mut relay, laptop, direct_join("alice", "bob"));
    send(&mut relay, phone, direct_join("alice", "bob"));
    send(&mut relay, bob, direct_join("bob", "alice"));

    let actions = send(&mut relay, bob, direct_message("bob", "alice", "which device?"));
    let (targets, _) = &delivered(&actions)[0];
    assert_eq!(*targets, vec![laptop, phone, bob]);

    // Presence survives losing one device and only drops with the last.
    assert!(close(&mut relay, laptop).is_empty());
    assert!(relay.is_online(&UserId::from("alice")));

    let actions = close(&mut relay, phone);
    assert_eq!(
        delivered(&actions),
        vec![(vec![bob], ServerEvent::UserOffline(UserId::from("alice")))]
    );
}

#[test]
fn roster_reflects_live_presence() {
    let mut relay = relay();
    connect(&mut relay, 1, "alice");
    let bob = connect(&mut relay, 2, "bob");
    connect(&mut relay, 3, "carol");
    close(&mut relay, bob);

    let dave = ConnectionId::new(4);
    relay.process_event(RelayEvent::ConnectionOpened { connection_id: dave });
    let actions = send(&mut relay, dave, ClientEvent::Authenticate(UserId::from("dave")));

    let roster = delivered(&actions)
        .into_iter()
        .find_map(|(targets, event)| match event {
            ServerEvent::ActiveUsers(users) if targets == vec![dave] => Some(users),
            _ => None,
        })
        .expect("authenticate should deliver a roster");
    assert_eq!(roster, vec![UserId::from("alice"), UserId::from("carol"), UserId::from("dave")]);
}

#[test]
fn identity_binding_survives_rebind_attempt() {
    let mut relay = relay();
    let alice = connect(&mut relay, 1, "alice");
    let bob = connect(&mut relay, 2, "bob");
    send(&mut relay, alice, direct_join("alice", "bob"));
    send(&mut relay, bob, direct_join("bob", "alice"));

    let actions = send(&mut relay, alice, ClientEvent::Authenticate(UserId::from("mallory")));
    assert!(matches!(
        &delivered(&actions)[0],
        (targets, ServerEvent::Error { .. }) if *targets == vec![alice]
    ));

    // The original binding still routes.
    let actions = send(&mut relay, alice, direct_message("alice", "bob", "still me"));
    let (targets, _) = &delivered(&actions)[0];
    assert_eq!(*targets, vec![alice, bob]);
    assert!(!relay.is_online(&UserId::from("mallory")));
}
