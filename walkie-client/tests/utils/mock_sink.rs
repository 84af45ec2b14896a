use async_trait::async_trait;
use std::sync::Mutex;
use walkie_client::ClientResult;
use walkie_client::peer::SignalSink;
use walkie_core::{ParticipantId, Signal, SignalKind};

/// Records outgoing signals instead of sending them.
#[derive(Default)]
pub struct MockSink {
    sent: Mutex<Vec<(ParticipantId, Signal)>>,
}

impl MockSink {
    pub fn sent(&self) -> Vec<(ParticipantId, Signal)> {
        self.sent.lock().unwrap().clone()
    }

    /// Targets of every signal of `kind`, in send order.
    pub fn targets(&self, kind: SignalKind) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(_, signal)| signal.kind() == kind)
            .map(|(target, _)| target.to_string())
            .collect()
    }
}

#[async_trait]
impl SignalSink for MockSink {
    async fn send_signal(&self, target: ParticipantId, signal: Signal) -> ClientResult<()> {
        self.sent.lock().unwrap().push((target, signal));
        Ok(())
    }
}
