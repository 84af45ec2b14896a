use async_trait::async_trait;
use walkie_core::{ParticipantId, ServerMessage};

/// Implemented by whatever holds the client connections, so the relay loop
/// can push messages out without knowing about websockets.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Sends `message` to `to`. Unknown or closed connections are skipped.
    async fn deliver(&self, to: ParticipantId, message: ServerMessage);
}
