use crate::error::ClientResult;
use async_trait::async_trait;
use walkie_core::{ParticipantId, Signal};

/// Outbound side of relay-mode negotiation.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn send_signal(&self, target: ParticipantId, signal: Signal) -> ClientResult<()>;
}
