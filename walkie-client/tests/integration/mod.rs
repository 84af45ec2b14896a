pub mod session_tests;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;

use walkie_client::ClientEvent;
use walkie_client::peer::{LinkEvent, PeerOrchestrator, SignalRoute};
use walkie_core::ParticipantId;

use crate::utils::{FakeCapture, FakeLinkFactory, MockSink};

pub const EVENT_TIMEOUT_MS: u64 = 3000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Relay-mode orchestrator wired to fakes.
pub struct TestPeer {
    pub orchestrator: PeerOrchestrator,
    pub link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    pub events: mpsc::UnboundedReceiver<ClientEvent>,
    pub factory: FakeLinkFactory,
    pub capture: Arc<FakeCapture>,
    pub sink: Arc<MockSink>,
}

pub fn create_test_peer(local: &str) -> TestPeer {
    create_test_peer_with(local, FakeCapture::default())
}

pub fn create_test_peer_with(local: &str, capture: FakeCapture) -> TestPeer {
    let factory = FakeLinkFactory::default();
    let capture = Arc::new(capture);
    let sink = Arc::new(MockSink::default());
    let (events_tx, events) = mpsc::unbounded_channel();

    let (mut orchestrator, link_rx) = PeerOrchestrator::new(
        Arc::new(factory.clone()),
        capture.clone(),
        SignalRoute::Relay(sink.clone()),
        events_tx,
    );
    orchestrator.set_local_id(ParticipantId::from(local));

    TestPeer {
        orchestrator,
        link_rx,
        events,
        factory,
        capture,
        sink,
    }
}

/// Skips events until `pick` accepts one.
pub async fn wait_for_event<T>(
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
    mut pick: impl FnMut(&ClientEvent) -> Option<T>,
) -> Option<T> {
    let wait = async {
        while let Some(event) = events.recv().await {
            if let Some(found) = pick(&event) {
                return Some(found);
            }
        }
        None
    };
    tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), wait)
        .await
        .ok()
        .flatten()
}

pub fn drain_events(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
