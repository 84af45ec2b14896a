use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use walkie_core::net::DEFAULT_HUB_PORT;

/// Where the hub listens and which browser origins may call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Empty means any origin.
    pub allow_origins: Vec<String>,
    /// PEM certificate chain. TLS is used only when the key is set too.
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_HUB_PORT,
            allow_origins: Vec::new(),
            cert_path: None,
            key_path: None,
        }
    }
}

impl HubConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Parses a comma separated origin list, as found in `ALLOW_ORIGINS`.
    pub fn with_origin_list(mut self, list: &str) -> Self {
        self.allow_origins = list
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty() && *o != "*")
            .map(str::to_string)
            .collect();
        self
    }

    pub fn with_tls(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.cert_path = Some(cert.into());
        self.key_path = Some(key.into());
        self
    }

    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        Some((self.cert_path.as_deref()?, self.key_path.as_deref()?))
    }
}
