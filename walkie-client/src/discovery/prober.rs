use crate::discovery::HubProbeResult;
use async_trait::async_trait;
use std::time::Instant;
use thiserror::Error;
use walkie_core::HubStatus;

/// A candidate that did not answer like a hub.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("unreachable hub: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
}

/// Health check against one candidate URL.
#[async_trait]
pub trait HubProber: Send + Sync {
    async fn probe(&self, url: &str) -> Result<HubProbeResult, ProbeError>;
}

/// Probes `GET {url}/health` over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HubProber for HttpProber {
    async fn probe(&self, url: &str) -> Result<HubProbeResult, ProbeError> {
        let url = url.trim_end_matches('/');
        let started = Instant::now();

        let response = self.client.get(format!("{url}/health")).send().await?;
        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status().as_u16()));
        }
        let latency_ms = started.elapsed().as_millis() as u64;

        // Anything answering 2xx counts; a body we cannot read only loses
        // the extra fields.
        let status = response.json::<HubStatus>().await.ok();

        Ok(HubProbeResult {
            url: url.to_string(),
            latency_ms,
            status: status.as_ref().map(|s| s.status.clone()),
            reported_user_count: status.and_then(|s| s.connected_count),
        })
    }
}
