use crate::relay::{RelayHandle, RelayServer};
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};
use walkie_core::{ParticipantId, ServerMessage};

struct SignalingInner {
    connections: DashMap<ParticipantId, mpsc::UnboundedSender<Message>>,
}

#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
    relay: RelayHandle,
}

impl SignalingService {
    pub fn new(relay: RelayHandle) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                connections: DashMap::new(),
            }),
            relay,
        }
    }

    /// Creates the service together with the relay loop that feeds it.
    pub fn start() -> Self {
        let (relay, command_rx) = RelayHandle::channel();
        let service = Self::new(relay);
        tokio::spawn(RelayServer::new(command_rx, Arc::new(service.clone())).run());
        service
    }

    pub fn relay(&self) -> &RelayHandle {
        &self.relay
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    pub(crate) fn add_connection(&self, conn: ParticipantId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.connections.insert(conn, tx);
    }

    pub(crate) fn remove_connection(&self, conn: &ParticipantId) {
        self.inner.connections.remove(conn);
    }

    pub fn send_signal(&self, conn: &ParticipantId, msg: &ServerMessage) {
        let Some(connection) = self.inner.connections.get(conn) else {
            warn!("Attempted to send signal to disconnected connection {}", conn);
            return;
        };

        match serde_json::to_string(msg) {
            Ok(json) => {
                if let Err(e) = connection.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {}: {:?}", conn, e);
                }
            }
            Err(e) => error!("Failed to serialize signal message: {}", e),
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn deliver(&self, to: ParticipantId, message: ServerMessage) {
        self.send_signal(&to, &message);
    }
}
