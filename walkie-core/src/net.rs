use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tracing::debug;

/// Port a hub listens on unless configured otherwise.
pub const DEFAULT_HUB_PORT: u16 = 41234;

/// Best guess at this machine's LAN address.
///
/// Connecting a UDP socket only selects a route; no packet leaves the host.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    if let Err(e) = socket.connect((Ipv4Addr::new(10, 254, 254, 254), 9)) {
        debug!("No route for LAN address lookup: {}", e);
        return None;
    }

    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() && !ip.is_loopback() => Some(ip),
        _ => None,
    }
}

/// First three octets of a dotted IPv4 host, e.g. `192.168.1` for
/// `192.168.1.20`. Hostnames and IPv6 addresses yield `None`.
pub fn subnet_prefix(host: &str) -> Option<String> {
    let ip: Ipv4Addr = host.parse().ok()?;
    let [a, b, c, _] = ip.octets();
    Some(format!("{a}.{b}.{c}"))
}
