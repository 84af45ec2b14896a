use walkie_core::{ClientMessage, ServerMessage, SessionDescription};

use crate::integration::init_tracing;
use crate::utils::{WsClient, presence_ids, spawn_hub, spawn_hub_with_service};

fn join(nickname: &str) -> ClientMessage {
    ClientMessage::Join {
        nickname: Some(nickname.to_string()),
        room: Some("lan".to_string()),
    }
}

#[tokio::test]
async fn test_each_connection_gets_a_distinct_id() {
    init_tracing();
    let addr = spawn_hub().await.unwrap();

    let a = WsClient::connect(addr).await.unwrap();
    let b = WsClient::connect(addr).await.unwrap();

    assert!(!a.id.is_empty());
    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn test_join_offer_answer_over_websocket() {
    init_tracing();
    let addr = spawn_hub().await.unwrap();

    let mut a = WsClient::connect(addr).await.unwrap();
    let mut b = WsClient::connect(addr).await.unwrap();

    a.send(&join("Ann")).await.unwrap();
    a.recv().await.unwrap();
    b.send(&join("Bob")).await.unwrap();

    let listed = b
        .recv_until(|m| matches!(m, ServerMessage::PresenceList { .. }).then_some(m))
        .await
        .unwrap();
    assert_eq!(presence_ids(&listed), vec![a.id.to_string(), b.id.to_string()]);

    a.send(&ClientMessage::Offer {
        target_id: b.id.clone(),
        sdp: SessionDescription::offer("v=0 offer"),
    })
    .await
    .unwrap();

    let (from, sdp) = b
        .recv_until(|m| match m {
            ServerMessage::Offer { from_id, sdp } => Some((from_id, sdp)),
            _ => None,
        })
        .await
        .unwrap();
    assert_eq!(from, a.id);
    assert_eq!(sdp.sdp, "v=0 offer");

    b.send(&ClientMessage::Answer {
        target_id: a.id.clone(),
        sdp: SessionDescription::answer("v=0 answer"),
    })
    .await
    .unwrap();

    let from = a
        .recv_until(|m| match m {
            ServerMessage::Answer { from_id, .. } => Some(from_id),
            _ => None,
        })
        .await
        .unwrap();
    assert_eq!(from, b.id);
}

#[tokio::test]
async fn test_malformed_frames_do_not_close_the_socket() {
    init_tracing();
    let addr = spawn_hub().await.unwrap();
    let mut a = WsClient::connect(addr).await.unwrap();

    a.send_raw("not json").await.unwrap();
    a.send_raw(r#"{"op":"teleport","d":{}}"#).await.unwrap();
    a.send(&ClientMessage::RequestPresence { room: None })
        .await
        .unwrap();

    let message = a.recv().await.unwrap();
    assert_eq!(presence_ids(&message), Vec::<String>::new());
}

#[tokio::test]
async fn test_closing_socket_removes_participant() {
    init_tracing();
    let addr = spawn_hub().await.unwrap();

    let mut a = WsClient::connect(addr).await.unwrap();
    let mut b = WsClient::connect(addr).await.unwrap();
    a.send(&join("Ann")).await.unwrap();
    b.send(&join("Bob")).await.unwrap();
    b.recv_until(|m| {
        matches!(&m, ServerMessage::PresenceList { participants } if participants.len() == 2)
            .then_some(())
    })
    .await
    .unwrap();

    let a_id = a.id.clone();
    a.close().await.unwrap();

    let remaining = b
        .recv_until(|m| match m {
            ServerMessage::PresenceList { participants } if participants.len() == 1 => {
                Some(participants)
            }
            _ => None,
        })
        .await
        .unwrap();
    assert_ne!(remaining[0].id, a_id);
}

#[tokio::test]
async fn test_open_connections_are_counted_until_closed() {
    init_tracing();
    let (addr, service) = spawn_hub_with_service().await.unwrap();
    assert_eq!(service.connection_count(), 0);

    let a = WsClient::connect(addr).await.unwrap();
    let b = WsClient::connect(addr).await.unwrap();
    assert_eq!(service.connection_count(), 2);

    a.close().await.unwrap();
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(3);
    while service.connection_count() != 1 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(service.connection_count(), 1);
    drop(b);
}
