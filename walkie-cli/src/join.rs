use anyhow::{Context, Result, bail};
use colored::*;
use dialoguer::{Input, Select};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use walkie::client::discovery::{self, DiscoveryOptions};
use walkie::client::peer::{RtcConfig, RtcLinkFactory};
use walkie::client::prefs::{FilePreferences, PrefKey, PreferenceStore};
use walkie::client::{ClientEvent, Session, SessionCommand, SessionConfig, TrackCapture};
use walkie::net::local_ipv4;

const HELP: &str = "Commands: tx | stop | room <name> | hub <url> | discover | quit";

pub async fn run(
    prefs_path: &Path,
    hub: Option<String>,
    nickname: Option<String>,
    room: String,
    ice_servers: Vec<String>,
) -> Result<()> {
    let prefs = Arc::new(FilePreferences::open(prefs_path));

    let nickname = match nickname.or_else(|| prefs.get(PrefKey::Nickname)) {
        Some(nickname) => nickname,
        None => {
            let nickname: String = Input::new()
                .with_prompt("Nickname")
                .default("Guest".to_string())
                .interact_text()?;
            prefs.set(PrefKey::Nickname, nickname.trim())?;
            nickname
        }
    };

    let hub = match hub.or_else(|| prefs.get(PrefKey::LastHub)) {
        Some(hub) => hub,
        None => pick_hub().await?,
    };

    let config = SessionConfig {
        hub: Some(hub),
        nickname: Some(nickname),
        room: Some(room),
        discovery: discovery_options(),
    };
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let (commands, commands_rx) = mpsc::unbounded_channel();

    let session = Session::new(
        config,
        Arc::new(RtcLinkFactory::new(RtcConfig { ice_servers })),
        Arc::new(TrackCapture::default()),
        prefs,
        events_tx,
    );
    println!(
        "{} {} in room '{}'",
        "🎙️  Joining as".green().bold(),
        session.nickname(),
        session.room()
    );
    println!("{}", HELP.dimmed());

    let session_task = tokio::spawn(session.run(commands_rx));
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let command = match word {
            "" => continue,
            "tx" | "t" => SessionCommand::StartTransmit,
            "stop" | "s" => SessionCommand::StopTransmit,
            "room" => SessionCommand::SetRoom(rest.trim().to_string()),
            "hub" if !rest.trim().is_empty() => SessionCommand::SetHub(rest.trim().to_string()),
            "discover" => SessionCommand::Discover,
            "quit" | "q" | "exit" => break,
            _ => {
                println!("{}", HELP.dimmed());
                continue;
            }
        };
        if commands.send(command).is_err() {
            break;
        }
    }

    let _ = commands.send(SessionCommand::Shutdown);
    session_task.await.context("Session task failed")?;
    printer.abort();
    Ok(())
}

fn discovery_options() -> DiscoveryOptions {
    DiscoveryOptions {
        origin: local_ipv4().map(|ip| format!("http://{ip}")),
        ..DiscoveryOptions::default()
    }
}

async fn pick_hub() -> Result<String> {
    println!("{}", "🔍 No hub remembered, searching...".cyan());
    let results = discovery::discover(&discovery_options()).await;
    if results.is_empty() {
        bail!("No hub found. Pass --hub or set WALKIE_HUB");
    }

    let labels: Vec<String> = results
        .iter()
        .map(|r| format!("{} ({} ms)", r.url, r.latency_ms))
        .collect();
    let index = Select::new()
        .with_prompt("Hub")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(results[index].url.clone())
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::HubConnected { url } => println!("{} {}", "✔ Connected to".green(), url),
        ClientEvent::HubDisconnected => println!("{}", "✖ Hub unavailable".red()),
        ClientEvent::Participants(list) if list.is_empty() => {
            println!("{}", "Nobody else is here".dimmed())
        }
        ClientEvent::Participants(list) => {
            let names: Vec<&str> = list.iter().map(|p| p.nickname.as_str()).collect();
            println!("{} {}", "In room:".bold(), names.join(", "));
        }
        ClientEvent::ConnectionState { remote, state } => {
            println!("   {} {:?}", remote.to_string().dimmed(), state)
        }
        ClientEvent::RemoteAudio { remote, .. } => {
            println!("{} {}", "🔊 Receiving audio from".cyan(), remote)
        }
        ClientEvent::PlaybackReleased { remote } => {
            println!("{} {}", "🔇 Audio ended from".dimmed(), remote)
        }
        ClientEvent::PeerFailed { remote, reason } => {
            println!("{} {}: {}", "⚠ Peer failed".yellow(), remote, reason)
        }
        ClientEvent::MicUnavailable(fault) => println!("{} {}", "⚠".yellow(), fault),
        ClientEvent::Transmitting(true) => println!("{}", "● Transmitting".red().bold()),
        ClientEvent::Transmitting(false) => println!("{}", "○ Idle".dimmed()),
        ClientEvent::Discovery(results) if results.is_empty() => {
            println!("{}", "No hub answered".yellow())
        }
        ClientEvent::Discovery(results) => {
            for r in results {
                println!("   {}  {} ms", r.url.bold(), r.latency_ms);
            }
        }
    }
}
