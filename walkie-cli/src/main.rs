mod commands;
mod join;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "walkie", version, about = "LAN push-to-talk hub and client")]
struct Cli {
    /// Preferences file (last hub, nickname).
    #[arg(long, global = true, env = "WALKIE_PREFS")]
    prefs: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a signaling hub.
    Hub {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: IpAddr,

        #[arg(short, long, env = "PORT", default_value_t = walkie::net::DEFAULT_HUB_PORT)]
        port: u16,

        /// Comma separated CORS origins. Empty or `*` allows any.
        #[arg(long, env = "ALLOW_ORIGINS", default_value = "")]
        allow_origins: String,

        /// PEM certificate chain. Serves HTTPS together with `--key`.
        #[arg(long, env = "SSL_CERT_PATH", requires = "key")]
        cert: Option<PathBuf>,

        /// PEM private key for `--cert`.
        #[arg(long, env = "SSL_KEY_PATH", requires = "cert")]
        key: Option<PathBuf>,
    },

    /// Look for hubs on the local network.
    Discover {
        /// Additional hosts to probe.
        #[arg(long = "host")]
        hosts: Vec<String>,

        /// Ports to probe instead of the default hub port.
        #[arg(short, long = "port")]
        ports: Vec<u16>,

        #[arg(long, default_value_t = 1800)]
        timeout_ms: u64,

        /// Remember the fastest hub found.
        #[arg(long)]
        save: bool,
    },

    /// Join a room and talk.
    Join {
        /// Hub address. Falls back to the remembered hub.
        #[arg(long, env = "WALKIE_HUB")]
        hub: Option<String>,

        #[arg(short, long)]
        nickname: Option<String>,

        #[arg(short, long, default_value = "default")]
        room: String,

        /// STUN/TURN server urls. None are needed on a LAN.
        #[arg(long = "ice-server")]
        ice_servers: Vec<String>,
    },

    /// Decode a manual pairing token.
    Inspect { token: String },

    /// Show or change remembered values.
    Prefs {
        #[arg(long)]
        hub: Option<String>,

        #[arg(long)]
        nickname: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let prefs_path = cli.prefs.unwrap_or_else(commands::default_prefs_path);

    match cli.command {
        Commands::Hub {
            host,
            port,
            allow_origins,
            cert,
            key,
        } => commands::hub(host, port, &allow_origins, cert.zip(key)).await,

        Commands::Discover {
            hosts,
            ports,
            timeout_ms,
            save,
        } => commands::discover(&prefs_path, hosts, ports, timeout_ms, save).await,

        Commands::Join {
            hub,
            nickname,
            room,
            ice_servers,
        } => join::run(&prefs_path, hub, nickname, room, ice_servers).await,

        Commands::Inspect { token } => commands::inspect(&token),

        Commands::Prefs { hub, nickname } => commands::prefs(&prefs_path, hub, nickname),
    }
}
