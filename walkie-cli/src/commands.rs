use anyhow::{Context, Result};
use colored::*;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkie::client::discovery::{self, DiscoveryOptions};
use walkie::client::normalize_hub_url;
use walkie::client::prefs::{FilePreferences, PrefKey, PreferenceStore};
use walkie::codec::{ManualPayload, PayloadKind};
use walkie::net::local_ipv4;
use walkie::server::HubConfig;

pub fn default_prefs_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".config/walkie/prefs.json"),
        None => PathBuf::from("walkie-prefs.json"),
    }
}

pub async fn hub(
    host: IpAddr,
    port: u16,
    allow_origins: &str,
    tls: Option<(PathBuf, PathBuf)>,
) -> Result<()> {
    let mut config = HubConfig {
        host,
        port,
        ..HubConfig::default()
    }
    .with_origin_list(allow_origins);
    if let Some((cert, key)) = tls {
        config = config.with_tls(cert, key);
    }

    println!("{}", "📡 Starting walkie hub...".green().bold());
    walkie::server::serve(config).await
}

pub async fn discover(
    prefs_path: &Path,
    hosts: Vec<String>,
    ports: Vec<u16>,
    timeout_ms: u64,
    save: bool,
) -> Result<()> {
    let prefs = FilePreferences::open(prefs_path);
    let options = DiscoveryOptions {
        stored_url: prefs.get(PrefKey::LastHub),
        origin: local_ipv4().map(|ip| format!("http://{ip}")),
        extra_hosts: hosts,
        ports,
        timeout: Duration::from_millis(timeout_ms),
        ..DiscoveryOptions::default()
    };

    println!("{}", "🔍 Searching for hubs...".cyan());
    let results = discovery::discover(&options).await;

    if results.is_empty() {
        println!("{}", "No hub answered. Pass --host if yours is elsewhere.".yellow());
        return Ok(());
    }

    for result in &results {
        let users = result
            .reported_user_count
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        println!(
            "   {}  {} ms  {} connected",
            result.url.bold(),
            result.latency_ms,
            users
        );
    }

    if save {
        let best = &results[0].url;
        prefs
            .set(PrefKey::LastHub, best)
            .context("Failed to save hub")?;
        println!("{} {}", "✨ Remembered".green(), best);
    }
    Ok(())
}

pub fn inspect(token: &str) -> Result<()> {
    let payload = ManualPayload::decode(token).context("Not a pairing token")?;
    let kind = match payload.kind {
        PayloadKind::Offer => "offer",
        PayloadKind::Answer => "answer",
    };
    let sdp = &payload.description.sdp;
    let candidates = sdp.lines().filter(|l| l.starts_with("a=candidate")).count();
    let media = sdp.lines().filter(|l| l.starts_with("m=")).count();

    println!("{} {}", "Kind:".bold(), kind);
    println!("{} {}", "Version:".bold(), payload.version);
    println!("{} {}", "Media sections:".bold(), media);
    println!("{} {}", "Candidates:".bold(), candidates);
    Ok(())
}

pub fn prefs(prefs_path: &Path, hub: Option<String>, nickname: Option<String>) -> Result<()> {
    let prefs = FilePreferences::open(prefs_path);
    if let Some(hub) = hub {
        prefs.set(PrefKey::LastHub, &normalize_hub_url(&hub))?;
    }
    if let Some(nickname) = nickname {
        prefs.set(PrefKey::Nickname, nickname.trim())?;
    }

    let show = |key| prefs.get(key).unwrap_or_else(|| "-".dimmed().to_string());
    println!("{} {}", "File:".bold(), prefs.path().display());
    println!("{} {}", "Last hub:".bold(), show(PrefKey::LastHub));
    println!("{} {}", "Nickname:".bold(), show(PrefKey::Nickname));
    Ok(())
}
