use crate::discovery::{DiscoveryOptions, HubCandidate};
use std::collections::HashSet;
use std::fmt;
use walkie_core::net::subnet_prefix;

pub const COMMON_SUBNETS: [&str; 4] = ["192.168.0", "192.168.1", "192.168.43", "10.0.0"];
pub const DEFAULT_LAST_OCTETS: [u8; 10] = [1, 2, 5, 10, 15, 20, 25, 50, 75, 100];

/// Fewest hosts tried per subnet, whatever the options say.
const MIN_HOSTS_PER_SUBNET: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Host, port and scheme pulled out of a hub address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubAddress {
    pub host: String,
    pub port: Option<u16>,
    pub protocol: Option<Protocol>,
}

impl HubAddress {
    /// Accepts `scheme://host[:port][/path]` or a bare `host[:port]`.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (protocol, rest) = match input.split_once("://") {
            Some((scheme, rest)) => {
                let protocol = match scheme.to_ascii_lowercase().as_str() {
                    "http" | "ws" => Some(Protocol::Http),
                    "https" | "wss" => Some(Protocol::Https),
                    _ => None,
                };
                (protocol, rest)
            }
            None => (None, input),
        };

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let authority = authority.rsplit('@').next().unwrap_or_default();

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, tail) = bracketed.split_once(']')?;
            (host, tail.strip_prefix(':').and_then(|p| p.parse().ok()))
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, port.parse().ok()),
                None => (authority, None),
            }
        };

        if host.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            port,
            protocol,
        })
    }
}

/// Produces the hosts discovery probes.
pub trait CandidateStrategy: Send + Sync {
    fn candidates(&self, options: &DiscoveryOptions) -> Vec<HubCandidate>;
}

/// Tries a handful of likely addresses on nearby private subnets.
///
/// Subnets come from the last known hub, then the local origin, then a
/// fixed list of common home-router ranges. Only a few last octets are
/// tried on each; hubs elsewhere need a stored or extra host.
#[derive(Debug, Clone)]
pub struct SubnetHeuristic {
    pub subnets: Vec<String>,
    pub last_octets: Vec<u8>,
}

impl Default for SubnetHeuristic {
    fn default() -> Self {
        Self {
            subnets: COMMON_SUBNETS.iter().map(|s| s.to_string()).collect(),
            last_octets: DEFAULT_LAST_OCTETS.to_vec(),
        }
    }
}

impl CandidateStrategy for SubnetHeuristic {
    fn candidates(&self, options: &DiscoveryOptions) -> Vec<HubCandidate> {
        let ports = options.port_hints();
        let stored = options.stored_url.as_deref().and_then(HubAddress::parse);
        let origin = options.origin.as_deref().and_then(HubAddress::parse);

        let mut bases: Vec<String> = Vec::new();
        let known = [stored.as_ref(), origin.as_ref()];
        for base in known
            .into_iter()
            .flatten()
            .filter_map(|a| subnet_prefix(&a.host))
            .chain(self.subnets.iter().cloned())
        {
            if !bases.contains(&base) {
                bases.push(base);
            }
        }

        let per_subnet = options.max_hosts_per_subnet.max(MIN_HOSTS_PER_SUBNET);
        let mut candidates = Vec::new();
        if let Some(stored) = &stored {
            let mut hints: Vec<u16> = stored.port.into_iter().collect();
            hints.extend(ports.iter().copied());
            candidates.push(HubCandidate::new(&stored.host, dedupe(hints)));
        }

        for base in &bases {
            for octet in self.last_octets.iter().take(per_subnet) {
                candidates.push(HubCandidate::new(format!("{base}.{octet}"), ports.clone()));
            }
        }

        for host in options.extra_hosts.iter().map(|h| h.trim()) {
            if !host.is_empty() {
                candidates.push(HubCandidate::new(host, ports.clone()));
            }
        }

        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert((c.host.clone(), c.port_hints.clone())));
        candidates
    }
}

/// Every `scheme://host[:port]` to probe, in preference order.
///
/// A protocol's default port is left out of the URL. Candidates without port
/// hints are tried on the default port only.
pub fn url_combinations(candidates: &[HubCandidate], protocols: &[Protocol]) -> Vec<String> {
    let mut urls = Vec::new();
    for candidate in candidates {
        let host = url_host(&candidate.host);
        for &protocol in protocols {
            let default_port = protocol.default_port();
            let ports = if candidate.port_hints.is_empty() {
                vec![default_port]
            } else {
                candidate.port_hints.clone()
            };

            for port in ports.into_iter().filter(|&p| p > 0) {
                urls.push(if port == default_port {
                    format!("{protocol}://{host}")
                } else {
                    format!("{protocol}://{host}:{port}")
                });
            }
        }
    }
    dedupe(urls)
}

/// IPv6 literals go back in brackets.
fn url_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

fn dedupe<T: Clone + Eq + std::hash::Hash>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}
