use walkie_core::{ClientMessage, IceCandidate, ParticipantId, ServerMessage, SessionDescription};
use walkie_server::RelayCommand;

use crate::integration::{create_test_relay, init_tracing};
use crate::utils::{expect_silence, presence_ids, wait_for_delivery};

fn join(conn: &ParticipantId, nickname: &str, room: &str) -> RelayCommand {
    RelayCommand::Inbound {
        conn: conn.clone(),
        message: ClientMessage::Join {
            nickname: Some(nickname.to_string()),
            room: Some(room.to_string()),
        },
    }
}

#[tokio::test]
async fn test_presence_broadcast_follows_join_order() {
    init_tracing();
    let (relay, mut rx, _output) = create_test_relay();
    let a = ParticipantId::from("a");
    let b = ParticipantId::from("b");

    relay.send(join(&a, "Ann", "crew")).await;
    let first = wait_for_delivery(&mut rx, &a).await.unwrap();
    assert_eq!(presence_ids(&first), vec!["a"]);

    relay.send(join(&b, "Bob", "crew")).await;
    let to_a = wait_for_delivery(&mut rx, &a).await.unwrap();
    let to_b = wait_for_delivery(&mut rx, &b).await.unwrap();
    assert_eq!(presence_ids(&to_a), vec!["a", "b"]);
    assert_eq!(presence_ids(&to_b), vec!["a", "b"]);
}

#[tokio::test]
async fn test_other_rooms_are_not_notified() {
    init_tracing();
    let (relay, mut rx, output) = create_test_relay();
    let a = ParticipantId::from("a");
    let b = ParticipantId::from("b");

    relay.send(join(&a, "Ann", "one")).await;
    wait_for_delivery(&mut rx, &a).await.unwrap();

    relay.send(join(&b, "Bob", "two")).await;
    wait_for_delivery(&mut rx, &b).await.unwrap();
    expect_silence(&mut rx, 100).await;

    assert_eq!(output.delivered_to(&a).await.len(), 1);
}

#[tokio::test]
async fn test_offer_is_relayed_with_sender_id() {
    init_tracing();
    let (relay, mut rx, _output) = create_test_relay();
    let a = ParticipantId::from("a");
    let b = ParticipantId::from("b");

    relay.send(join(&a, "Ann", "crew")).await;
    relay.send(join(&b, "Bob", "crew")).await;
    wait_for_delivery(&mut rx, &b).await.unwrap();

    relay
        .send(RelayCommand::Inbound {
            conn: a.clone(),
            message: ClientMessage::Offer {
                target_id: b.clone(),
                sdp: SessionDescription::offer("v=0"),
            },
        })
        .await;

    let message = wait_for_delivery(&mut rx, &b).await.unwrap();
    assert_eq!(
        message,
        ServerMessage::Offer {
            from_id: a,
            sdp: SessionDescription::offer("v=0"),
        }
    );
}

#[tokio::test]
async fn test_signal_to_unknown_target_is_dropped() {
    init_tracing();
    let (relay, mut rx, output) = create_test_relay();
    let a = ParticipantId::from("a");

    relay.send(join(&a, "Ann", "crew")).await;
    wait_for_delivery(&mut rx, &a).await.unwrap();

    relay
        .send(RelayCommand::Inbound {
            conn: a.clone(),
            message: ClientMessage::Ice {
                target_id: ParticipantId::from("never-joined"),
                candidate: IceCandidate::new("candidate:0 1 udp 1 10.0.0.9 9 typ host"),
            },
        })
        .await;

    expect_silence(&mut rx, 100).await;
    assert_eq!(output.count().await, 1);
}

#[tokio::test]
async fn test_disconnect_refreshes_presence() {
    init_tracing();
    let (relay, mut rx, _output) = create_test_relay();
    let a = ParticipantId::from("a");
    let b = ParticipantId::from("b");

    relay.send(join(&a, "Ann", "crew")).await;
    relay.send(join(&b, "Bob", "crew")).await;
    wait_for_delivery(&mut rx, &b).await.unwrap();

    relay.send(RelayCommand::Disconnect { conn: a.clone() }).await;
    let to_b = wait_for_delivery(&mut rx, &b).await.unwrap();
    assert_eq!(presence_ids(&to_b), vec!["b"]);

    // A second disconnect for the same connection changes nothing.
    relay.send(RelayCommand::Disconnect { conn: a }).await;
    expect_silence(&mut rx, 100).await;
}

#[tokio::test]
async fn test_snapshot_counts_participants() {
    init_tracing();
    let (relay, mut rx, _output) = create_test_relay();
    let a = ParticipantId::from("a");

    let empty = relay.snapshot().await.unwrap();
    assert_eq!(empty.status.connected_count, Some(0));
    assert!(empty.presence.rooms.is_empty());

    relay.send(join(&a, "  ", "")).await;
    wait_for_delivery(&mut rx, &a).await.unwrap();

    let snapshot = relay.snapshot().await.unwrap();
    assert_eq!(snapshot.status.status, "ok");
    assert_eq!(snapshot.status.connected_count, Some(1));
    assert_eq!(snapshot.presence.rooms["default"][0].nickname, "Guest");
}
