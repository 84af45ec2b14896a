use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use walkie_client::discovery::{HubProbeResult, HubProber, ProbeError};

/// Prober with scripted answers. Listed URLs answer after their latency;
/// every other URL never answers.
#[derive(Default)]
pub struct FakeProber {
    hubs: HashMap<String, u64>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    probed: AtomicUsize,
}

impl FakeProber {
    pub fn with_hub(mut self, url: &str, latency_ms: u64) -> Self {
        self.hubs.insert(url.to_string(), latency_ms);
        self
    }

    /// Most probes that were ever running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn probed(&self) -> usize {
        self.probed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HubProber for FakeProber {
    async fn probe(&self, url: &str) -> Result<HubProbeResult, ProbeError> {
        self.probed.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        match self.hubs.get(url) {
            Some(&latency_ms) => {
                tokio::time::sleep(Duration::from_millis(latency_ms)).await;
                Ok(HubProbeResult {
                    url: url.to_string(),
                    latency_ms,
                    status: Some("ok".to_string()),
                    reported_user_count: Some(1),
                })
            }
            None => std::future::pending().await,
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
