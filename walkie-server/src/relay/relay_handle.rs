use crate::relay::registry::HubSnapshot;
use crate::relay::relay_command::RelayCommand;
use crate::relay::relay_server::RelayServer;
use crate::signaling::SignalingOutput;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::error;

const COMMAND_BUFFER: usize = 256;

/// Cloneable sender side of a running [`RelayServer`].
#[derive(Clone)]
pub struct RelayHandle {
    command_tx: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    pub fn new(command_tx: mpsc::Sender<RelayCommand>) -> Self {
        Self { command_tx }
    }

    /// Spawns a relay loop that delivers through `output`.
    pub fn spawn(output: Arc<dyn SignalingOutput>) -> Self {
        let (handle, command_rx) = Self::channel();
        tokio::spawn(RelayServer::new(command_rx, output).run());
        handle
    }

    /// Creates a handle and the receiver a [`RelayServer`] should consume.
    pub fn channel() -> (Self, mpsc::Receiver<RelayCommand>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        (Self::new(command_tx), command_rx)
    }

    /// Returns false once the relay loop has stopped.
    pub async fn send(&self, cmd: RelayCommand) -> bool {
        if let Err(e) = self.command_tx.send(cmd).await {
            error!("Relay loop is gone: {}", e);
            return false;
        }
        true
    }

    pub async fn snapshot(&self) -> Option<HubSnapshot> {
        let (reply, rx) = oneshot::channel();
        if !self.send(RelayCommand::Snapshot { reply }).await {
            return None;
        }
        rx.await.ok()
    }
}
