use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use walkie_client::prefs::{MemoryPreferences, PrefKey, PreferenceStore};
use walkie_client::{ClientEvent, MediaFault, Session, SessionCommand, SessionConfig};
use walkie_core::{
    ClientMessage, Participant, ParticipantId, RoomId, SdpKind, ServerMessage,
};
use walkie_server::HubConfig;

use crate::integration::{EVENT_TIMEOUT_MS, init_tracing, wait_for_event};
use crate::utils::{FakeCapture, FakeLinkFactory, LinkCalls};

async fn spawn_hub() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(walkie_server::serve_listener(listener, HubConfig::default()));
    addr
}

struct TestSession {
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    factory: FakeLinkFactory,
    prefs: Arc<MemoryPreferences>,
    task: JoinHandle<()>,
}

fn start_session(config: SessionConfig, capture: FakeCapture) -> TestSession {
    start_session_with(config, capture, Arc::new(MemoryPreferences::default()))
}

fn start_session_with(
    config: SessionConfig,
    capture: FakeCapture,
    prefs: Arc<MemoryPreferences>,
) -> TestSession {
    let factory = FakeLinkFactory::default();
    let (events_tx, events) = mpsc::unbounded_channel();
    let (commands, commands_rx) = mpsc::unbounded_channel();

    let session = Session::new(
        config,
        Arc::new(factory.clone()),
        Arc::new(capture),
        prefs.clone(),
        events_tx,
    );
    let task = tokio::spawn(session.run(commands_rx));

    TestSession {
        commands,
        events,
        factory,
        prefs,
        task,
    }
}

fn config(hub: SocketAddr, nickname: &str, room: &str) -> SessionConfig {
    SessionConfig {
        hub: Some(hub.to_string()),
        nickname: Some(nickname.to_string()),
        room: Some(room.to_string()),
        ..Default::default()
    }
}

async fn wait_connected(session: &mut TestSession) -> String {
    wait_for_event(&mut session.events, |event| match event {
        ClientEvent::HubConnected { url } => Some(url.clone()),
        _ => None,
    })
    .await
    .expect("session never reached the hub")
}

async fn wait_members(session: &mut TestSession, count: usize) -> Vec<ParticipantId> {
    wait_for_event(&mut session.events, |event| match event {
        ClientEvent::Participants(list) if list.len() == count => {
            Some(list.iter().map(|p| p.id.clone()).collect())
        }
        _ => None,
    })
    .await
    .expect("participant list never matched")
}

/// Polls `check` until it holds or the event timeout passes.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(EVENT_TIMEOUT_MS);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

/// Accepts one client on a hand-driven hub socket.
async fn accept_client(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let accept = async {
        let (stream, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    };
    tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), accept)
        .await
        .expect("session never connected")
}

async fn next_client_message(ws: &mut WebSocketStream<TcpStream>) -> ClientMessage {
    loop {
        if let Message::Text(text) = ws.next().await.unwrap().unwrap() {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send_server_message(ws: &mut WebSocketStream<TcpStream>, message: ServerMessage) {
    let json = serde_json::to_string(&message).unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

fn remote_kinds(calls: &std::sync::Mutex<LinkCalls>) -> Vec<SdpKind> {
    calls.lock().unwrap().remote.iter().map(|d| d.kind).collect()
}

#[tokio::test]
async fn test_sessions_in_one_room_see_each_other() {
    init_tracing();
    let hub = spawn_hub().await;
    let mut ann = start_session(config(hub, "Ann", "crew"), FakeCapture::default());
    wait_connected(&mut ann).await;
    let mut bob = start_session(config(hub, "Bob", "crew"), FakeCapture::default());
    wait_connected(&mut bob).await;

    let seen_by_ann = wait_members(&mut ann, 1).await;
    let seen_by_bob = wait_members(&mut bob, 1).await;
    assert_ne!(seen_by_ann, seen_by_bob);

    // Nobody transmits, so nobody calls.
    assert!(ann.factory.created().is_empty());
    assert!(bob.factory.created().is_empty());
}

#[tokio::test]
async fn test_transmit_negotiates_through_hub() {
    init_tracing();
    let hub = spawn_hub().await;
    let mut ann = start_session(config(hub, "Ann", "crew"), FakeCapture::default());
    wait_connected(&mut ann).await;
    let mut bob = start_session(config(hub, "Bob", "crew"), FakeCapture::default());
    wait_connected(&mut bob).await;

    let bob_id = wait_members(&mut ann, 1).await.remove(0);
    let ann_id = wait_members(&mut bob, 1).await.remove(0);

    ann.commands.send(SessionCommand::StartTransmit).unwrap();
    let transmitting = wait_for_event(&mut ann.events, |event| match event {
        ClientEvent::Transmitting(on) => Some(*on),
        _ => None,
    })
    .await;
    assert_eq!(transmitting, Some(true));

    let bob_factory = bob.factory.clone();
    assert!(eventually(|| bob_factory.created() == vec![ann_id.clone()]).await);
    let offered = bob.factory.calls(ann_id.as_str());
    assert!(eventually(|| remote_kinds(&offered) == vec![SdpKind::Offer]).await);

    let answered = ann.factory.calls(bob_id.as_str());
    assert!(eventually(|| remote_kinds(&answered) == vec![SdpKind::Answer]).await);
    assert_eq!(answered.lock().unwrap().attached, 1);
    assert_eq!(ann.factory.created(), vec![bob_id]);
}

#[tokio::test]
async fn test_unavailable_microphone_is_reported() {
    init_tracing();
    let mut session = start_session(
        SessionConfig::default(),
        FakeCapture::failing(MediaFault::DeviceBusy),
    );

    session.commands.send(SessionCommand::StartTransmit).unwrap();
    let fault = wait_for_event(&mut session.events, |event| match event {
        ClientEvent::MicUnavailable(fault) => Some(fault.clone()),
        _ => None,
    })
    .await;

    assert_eq!(fault, Some(MediaFault::DeviceBusy));
}

#[tokio::test]
async fn test_connected_hub_is_remembered_and_reused() {
    init_tracing();
    let hub = spawn_hub().await;
    let mut first = start_session(config(hub, "Ann", "crew"), FakeCapture::default());

    let url = wait_connected(&mut first).await;
    assert_eq!(url, format!("http://{hub}"));
    assert_eq!(first.prefs.get(PrefKey::LastHub), Some(url.clone()));

    let mut second = start_session_with(
        SessionConfig::default(),
        FakeCapture::default(),
        first.prefs.clone(),
    );
    assert_eq!(wait_connected(&mut second).await, url);
}

#[tokio::test]
async fn test_unreachable_hub_reports_disconnected() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed = listener.local_addr().unwrap();
    drop(listener);

    let mut session = start_session(config(closed, "Ann", "crew"), FakeCapture::default());
    let disconnected = wait_for_event(&mut session.events, |event| {
        matches!(event, ClientEvent::HubDisconnected).then_some(())
    })
    .await;

    assert!(disconnected.is_some());
    assert_eq!(session.prefs.get(PrefKey::LastHub), None);
}

#[tokio::test]
async fn test_switching_room_changes_members() {
    init_tracing();
    let hub = spawn_hub().await;
    let mut ann = start_session(config(hub, "Ann", "one"), FakeCapture::default());
    wait_connected(&mut ann).await;
    let mut bob = start_session(config(hub, "Bob", "two"), FakeCapture::default());
    wait_connected(&mut bob).await;
    wait_members(&mut bob, 0).await;

    ann.commands
        .send(SessionCommand::SetRoom("two".to_string()))
        .unwrap();

    wait_members(&mut ann, 1).await;
    wait_members(&mut bob, 1).await;
}

#[tokio::test]
async fn test_shutdown_ends_the_session() {
    init_tracing();
    let hub = spawn_hub().await;
    let mut session = start_session(config(hub, "Ann", "crew"), FakeCapture::default());
    wait_connected(&mut session).await;

    session.commands.send(SessionCommand::Shutdown).unwrap();

    tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), session.task)
        .await
        .expect("session did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_changing_hub_closes_peers_of_the_old_hub() {
    init_tracing();
    let hub = spawn_hub().await;
    let mut ann = start_session(config(hub, "Ann", "crew"), FakeCapture::default());
    wait_connected(&mut ann).await;
    let mut bob = start_session(config(hub, "Bob", "crew"), FakeCapture::default());
    wait_connected(&mut bob).await;

    let bob_id = wait_members(&mut ann, 1).await.remove(0);
    ann.commands.send(SessionCommand::StartTransmit).unwrap();
    let answered = ann.factory.calls(bob_id.as_str());
    assert!(eventually(|| remote_kinds(&answered) == vec![SdpKind::Answer]).await);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed = listener.local_addr().unwrap();
    drop(listener);
    ann.commands
        .send(SessionCommand::SetHub(closed.to_string()))
        .unwrap();

    assert!(eventually(|| answered.lock().unwrap().closed).await);
    wait_members(&mut ann, 0).await;
    let disconnected = wait_for_event(&mut ann.events, |event| {
        matches!(event, ClientEvent::HubDisconnected).then_some(())
    })
    .await;
    assert!(disconnected.is_some());
}

#[tokio::test]
async fn test_connect_joins_room_and_asks_for_presence() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let hub = listener.local_addr().unwrap();
    let mut session = start_session(config(hub, "Ann", "crew"), FakeCapture::default());

    let mut ws = accept_client(&listener).await;
    assert_eq!(
        next_client_message(&mut ws).await,
        ClientMessage::Join {
            nickname: Some("Ann".to_string()),
            room: Some("crew".to_string()),
        }
    );
    assert_eq!(
        next_client_message(&mut ws).await,
        ClientMessage::RequestPresence {
            room: Some("crew".to_string()),
        }
    );
    wait_connected(&mut session).await;
}

#[tokio::test]
async fn test_lost_hub_is_rejoined_and_transmit_resumes() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let hub = listener.local_addr().unwrap();
    let mut ann = start_session(config(hub, "Ann", "crew"), FakeCapture::default());

    let mut first = accept_client(&listener).await;
    wait_connected(&mut ann).await;
    ann.commands.send(SessionCommand::StartTransmit).unwrap();
    let transmitting = wait_for_event(&mut ann.events, |event| match event {
        ClientEvent::Transmitting(on) => Some(*on),
        _ => None,
    })
    .await;
    assert_eq!(transmitting, Some(true));

    first.close(None).await.unwrap();
    drop(first);
    let disconnected = wait_for_event(&mut ann.events, |event| {
        matches!(event, ClientEvent::HubDisconnected).then_some(())
    })
    .await;
    assert!(disconnected.is_some());

    let mut second = accept_client(&listener).await;
    assert_eq!(
        next_client_message(&mut second).await,
        ClientMessage::Join {
            nickname: Some("Ann".to_string()),
            room: Some("crew".to_string()),
        }
    );
    assert_eq!(wait_connected(&mut ann).await, format!("http://{hub}"));

    let room = RoomId::parse(Some("crew"));
    let ann_id = ParticipantId::generate();
    let bob = Participant::new(ParticipantId::generate(), Some("Bob"), room.clone());
    send_server_message(&mut second, ServerMessage::Welcome { id: ann_id.clone() }).await;
    send_server_message(
        &mut second,
        ServerMessage::PresenceList {
            participants: vec![Participant::new(ann_id, Some("Ann"), room), bob.clone()],
        },
    )
    .await;

    assert_eq!(wait_members(&mut ann, 1).await, vec![bob.id.clone()]);
    let factory = ann.factory.clone();
    assert!(eventually(|| factory.created() == vec![bob.id.clone()]).await);
}
