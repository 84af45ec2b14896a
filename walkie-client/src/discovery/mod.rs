//! Best-effort search for a hub on the local network.
//!
//! Candidate hosts come from a pluggable [`CandidateStrategy`]; every
//! host × protocol × port URL is health-checked with a bounded number of
//! probes in flight. Finding nothing is a normal outcome and yields an
//! empty list.

mod candidates;
mod prober;

pub use candidates::*;
pub use prober::*;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};
use walkie_core::net::DEFAULT_HUB_PORT;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1800);
pub const DEFAULT_MAX_HOSTS_PER_SUBNET: usize = 10;
pub const DEFAULT_CONCURRENCY: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubCandidate {
    pub host: String,
    pub port_hints: Vec<u16>,
}

impl HubCandidate {
    pub fn new(host: impl Into<String>, port_hints: Vec<u16>) -> Self {
        Self {
            host: host.into(),
            port_hints,
        }
    }
}

/// A hub that answered its health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubProbeResult {
    pub url: String,
    pub latency_ms: u64,
    pub status: Option<String>,
    pub reported_user_count: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Last hub this device used; tried first.
    pub stored_url: Option<String>,
    /// Address this device is reachable at, e.g. `http://192.168.1.20`.
    /// Its subnet is scanned and an `https` origin prefers `https` probes.
    pub origin: Option<String>,
    pub extra_hosts: Vec<String>,
    /// Empty means the default hub port.
    pub ports: Vec<u16>,
    /// Overrides the origin-derived protocol order.
    pub protocols: Option<Vec<Protocol>>,
    pub timeout: Duration,
    pub max_hosts_per_subnet: usize,
    pub concurrency: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            stored_url: None,
            origin: None,
            extra_hosts: Vec::new(),
            ports: Vec::new(),
            protocols: None,
            timeout: DEFAULT_PROBE_TIMEOUT,
            max_hosts_per_subnet: DEFAULT_MAX_HOSTS_PER_SUBNET,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl DiscoveryOptions {
    pub fn port_hints(&self) -> Vec<u16> {
        if self.ports.is_empty() {
            return vec![DEFAULT_HUB_PORT];
        }
        let mut seen = HashSet::new();
        self.ports.iter().copied().filter(|p| seen.insert(*p)).collect()
    }

    pub fn protocol_preference(&self) -> Vec<Protocol> {
        if let Some(protocols) = &self.protocols {
            return protocols.clone();
        }
        let secure_origin = self
            .origin
            .as_deref()
            .and_then(HubAddress::parse)
            .is_some_and(|a| a.protocol == Some(Protocol::Https));
        if secure_origin {
            vec![Protocol::Https, Protocol::Http]
        } else {
            vec![Protocol::Http, Protocol::Https]
        }
    }
}

/// Discovery with the default subnet heuristic and HTTP prober.
pub async fn discover(options: &DiscoveryOptions) -> Vec<HubProbeResult> {
    discover_with(&SubnetHeuristic::default(), &HttpProber::default(), options).await
}

/// Probes every candidate URL and returns the hubs that answered, fastest
/// first, one entry per URL.
pub async fn discover_with(
    strategy: &dyn CandidateStrategy,
    prober: &dyn HubProber,
    options: &DiscoveryOptions,
) -> Vec<HubProbeResult> {
    let candidates = strategy.candidates(options);
    let urls = url_combinations(&candidates, &options.protocol_preference());
    if urls.is_empty() {
        return Vec::new();
    }
    debug!(
        "Probing {} hub URLs ({} at a time)",
        urls.len(),
        options.concurrency
    );

    let timeout = options.timeout;
    let mut results: Vec<HubProbeResult> = futures::stream::iter(urls)
        .map(|url| async move {
            match tokio::time::timeout(timeout, prober.probe(&url)).await {
                Ok(Ok(result)) => Some(result),
                Ok(Err(e)) => {
                    debug!("Probe {} failed: {}", url, e);
                    None
                }
                Err(_) => {
                    debug!("Probe {} timed out", url);
                    None
                }
            }
        })
        .buffer_unordered(options.concurrency.max(1))
        .filter_map(|result| async move { result })
        .collect()
        .await;

    results.sort_by_key(|r| r.latency_ms);
    let mut seen = HashSet::new();
    results.retain(|r| seen.insert(r.url.clone()));

    info!("Discovery found {} hub(s)", results.len());
    results
}
