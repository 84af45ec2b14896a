use crate::media::{LocalAudio, RemoteAudio};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use walkie_core::{IceCandidate, ParticipantId, SessionDescription};

/// Transport connectivity as reported by the peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Callbacks of one link, funnelled into the orchestrator's event loop.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    LocalCandidate {
        remote: ParticipantId,
        candidate: IceCandidate,
    },
    StateChanged {
        remote: ParticipantId,
        state: LinkState,
    },
    RemoteAudio {
        remote: ParticipantId,
        audio: RemoteAudio,
    },
}

/// One direct connection to a remote participant.
#[async_trait]
pub trait PeerLink: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;
    async fn create_answer(&self) -> Result<SessionDescription>;
    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Sends `audio` on this link. Attaching the track twice is a no-op.
    async fn attach_audio(&self, audio: &LocalAudio) -> Result<()>;
    async fn detach_audio(&self) -> Result<()>;

    /// Resolves once candidate gathering finished or `timeout` elapsed.
    async fn wait_for_gathering(&self, timeout: Duration);

    /// Current local description, including gathered candidates.
    async fn local_description(&self) -> Option<SessionDescription>;
    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait PeerLinkFactory: Send + Sync {
    /// Creates the link to `remote`; its callbacks report into `events`.
    async fn create(
        &self,
        remote: ParticipantId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Box<dyn PeerLink>>;
}
