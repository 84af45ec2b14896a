use crate::relay::registry::{Delivery, Registry};
use crate::relay::relay_command::RelayCommand;
use crate::signaling::SignalingOutput;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use walkie_core::{ClientMessage, ParticipantId};

/// Event loop that owns the participant registry.
///
/// Every command is processed to completion, deliveries included, before the
/// next one is read. That keeps presence broadcasts in the order the
/// join/leave events happened without any locking around the registry.
pub struct RelayServer {
    registry: Registry,
    command_rx: mpsc::Receiver<RelayCommand>,
    output: Arc<dyn SignalingOutput>,
}

impl RelayServer {
    pub fn new(command_rx: mpsc::Receiver<RelayCommand>, output: Arc<dyn SignalingOutput>) -> Self {
        Self {
            registry: Registry::new(),
            command_rx,
            output,
        }
    }

    pub async fn run(mut self) {
        info!("Relay event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
        }

        info!("Command channel closed. Relay event loop finished");
    }

    async fn handle_command(&mut self, cmd: RelayCommand) {
        match cmd {
            RelayCommand::Inbound { conn, message } => self.handle_message(conn, message).await,

            RelayCommand::Disconnect { conn } => {
                if self.registry.contains(&conn) {
                    info!("Participant {} disconnected", conn);
                }
                let deliveries = self.registry.leave(&conn);
                self.dispatch(deliveries).await;
            }

            RelayCommand::Snapshot { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    async fn handle_message(&mut self, conn: ParticipantId, message: ClientMessage) {
        match message {
            ClientMessage::Join { nickname, room } => {
                let deliveries = self
                    .registry
                    .join(&conn, nickname.as_deref(), room.as_deref());
                if let Some(p) = self.registry.get(&conn) {
                    info!("{} joined room '{}' as {}", conn, p.room, p.nickname);
                }
                self.dispatch(deliveries).await;
            }

            ClientMessage::RequestPresence { room } => {
                let delivery = self.registry.request_presence(&conn, room.as_deref());
                self.dispatch(vec![delivery]).await;
            }

            ClientMessage::Leave => {
                if let Some(p) = self.registry.get(&conn) {
                    info!("{} left room '{}'", conn, p.room);
                }
                let deliveries = self.registry.leave(&conn);
                self.dispatch(deliveries).await;
            }

            relayed @ (ClientMessage::Offer { .. }
            | ClientMessage::Answer { .. }
            | ClientMessage::Ice { .. }) => {
                let Some((target, signal)) = relayed.into_relay() else {
                    return;
                };
                let kind = signal.kind();
                match self.registry.relay(&conn, &target, signal) {
                    Ok(delivery) => self.dispatch(vec![delivery]).await,
                    Err(reason) => {
                        debug!("Dropped {:?} from {} to '{}': {}", kind, conn, target, reason)
                    }
                }
            }
        }
    }

    async fn dispatch(&self, deliveries: Vec<Delivery>) {
        for Delivery { to, message } in deliveries {
            self.output.deliver(to, message).await;
        }
    }
}
