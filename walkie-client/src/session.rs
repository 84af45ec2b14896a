use crate::discovery::{DiscoveryOptions, HubProbeResult, discover};
use crate::error::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::media::AudioCapture;
use crate::peer::{LinkEvent, PeerLinkFactory, PeerOrchestrator, SignalRoute};
use crate::prefs::{PrefKey, PreferenceStore};
use crate::relay_client::RelayClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use walkie_core::{Participant, RoomId, ServerMessage};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(500);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Commands from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    StartTransmit,
    StopTransmit,
    SetRoom(String),
    SetHub(String),
    Discover,
    Shutdown,
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Hub to attach to at start. Falls back to the stored last hub.
    pub hub: Option<String>,
    pub nickname: Option<String>,
    pub room: Option<String>,
    pub discovery: DiscoveryOptions,
}

/// One client: a hub connection, its room membership and the peers in it.
///
/// [`Session::run`] is the single task that owns all of it, selecting over
/// presentation commands, hub messages, link callbacks and discovery
/// results. A lost or unreachable hub is retried with backoff until the
/// hub is changed or the session shuts down.
pub struct Session {
    nickname: String,
    room: RoomId,
    discovery: DiscoveryOptions,
    orchestrator: PeerOrchestrator,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    relay: Option<Arc<RelayClient>>,
    inbound: Option<mpsc::UnboundedReceiver<ServerMessage>>,
    discovery_tx: mpsc::UnboundedSender<Vec<HubProbeResult>>,
    discovery_rx: mpsc::UnboundedReceiver<Vec<HubProbeResult>>,
    prefs: Arc<dyn PreferenceStore>,
    events: mpsc::UnboundedSender<ClientEvent>,
    hub: Option<String>,
    reconnect_at: Option<Instant>,
    reconnect_delay: Duration,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        factory: Arc<dyn PeerLinkFactory>,
        capture: Arc<dyn AudioCapture>,
        prefs: Arc<dyn PreferenceStore>,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        let nickname = config
            .nickname
            .or_else(|| prefs.get(PrefKey::Nickname));
        let nickname = Participant::sanitize_nickname(nickname.as_deref());
        let hub = config.hub.or_else(|| prefs.get(PrefKey::LastHub));

        // Routed through the relay once a hub is attached.
        let (orchestrator, link_rx) =
            PeerOrchestrator::new(factory, capture, SignalRoute::manual(), events.clone());
        let (discovery_tx, discovery_rx) = mpsc::unbounded_channel();

        Self {
            nickname,
            room: RoomId::parse(config.room.as_deref()),
            discovery: config.discovery,
            orchestrator,
            link_rx,
            relay: None,
            inbound: None,
            discovery_tx,
            discovery_rx,
            prefs,
            events,
            hub,
            reconnect_at: None,
            reconnect_delay: INITIAL_RECONNECT_DELAY,
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        if let Some(hub) = self.hub.clone() {
            self.attach(&hub).await;
        }

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    None | Some(SessionCommand::Shutdown) => break,
                    Some(command) => self.handle_command(command).await,
                },

                message = Self::next_message(&mut self.inbound) => match message {
                    Some(message) => self.orchestrator.handle_server_message(message).await,
                    None => self.detach().await,
                },

                _ = Self::wait_until(self.reconnect_at) => self.retry_hub().await,

                Some(event) = self.link_rx.recv() => {
                    self.orchestrator.handle_link_event(event).await;
                }

                Some(results) = self.discovery_rx.recv() => {
                    self.emit(ClientEvent::Discovery(results));
                }
            }
        }

        self.orchestrator.stop_transmit().await;
        if let Some(relay) = &self.relay {
            let _ = relay.leave();
        }
        self.orchestrator.reset().await;
        info!("Session finished");
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::StartTransmit => match self.orchestrator.start_transmit().await {
                Ok(()) => self.emit(ClientEvent::Transmitting(true)),
                Err(ClientError::MediaUnavailable(fault)) => {
                    warn!("Cannot transmit: {}", fault);
                    self.emit(ClientEvent::MicUnavailable(fault));
                }
                Err(e) => warn!("Cannot transmit: {}", e),
            },

            SessionCommand::StopTransmit => {
                self.orchestrator.stop_transmit().await;
                self.emit(ClientEvent::Transmitting(false));
            }

            SessionCommand::SetRoom(room) => {
                self.room = RoomId::parse(Some(&room));
                info!("Switching to room '{}'", self.room);
                if let Some(relay) = &self.relay
                    && let Err(e) = relay.join(&self.nickname, self.room.as_str())
                {
                    warn!("Failed to join room '{}': {}", self.room, e);
                }
            }

            SessionCommand::SetHub(hub) => {
                self.drop_hub().await;
                self.hub = Some(hub.clone());
                self.attach(&hub).await;
            }

            SessionCommand::Discover => self.spawn_discovery(),

            SessionCommand::Shutdown => {}
        }
    }

    async fn attach(&mut self, hub: &str) {
        self.reconnect_at = None;
        self.reconnect_delay = INITIAL_RECONNECT_DELAY;
        match self.connect(hub).await {
            Ok(url) => self.emit(ClientEvent::HubConnected { url }),
            Err(e) => {
                warn!("Could not attach to hub {}: {}", hub, e);
                self.emit(ClientEvent::HubDisconnected);
                self.schedule_reconnect();
            }
        }
    }

    async fn connect(&mut self, hub: &str) -> ClientResult<String> {
        let (client, inbound) = RelayClient::connect(hub).await?;
        let client = Arc::new(client);
        client.join(&self.nickname, self.room.as_str())?;
        client.request_presence(self.room.as_str())?;

        self.orchestrator.reset().await;
        self.orchestrator
            .set_route(SignalRoute::Relay(client.clone()));

        let url = client.hub_url().to_string();
        if let Err(e) = self.prefs.set(PrefKey::LastHub, &url) {
            warn!("Failed to remember hub: {}", e);
        }

        self.relay = Some(client);
        self.inbound = Some(inbound);
        Ok(url)
    }

    async fn retry_hub(&mut self) {
        self.reconnect_at = None;
        let Some(hub) = self.hub.clone() else {
            return;
        };
        match self.connect(&hub).await {
            Ok(url) => {
                info!("Reconnected to hub {}", url);
                self.reconnect_delay = INITIAL_RECONNECT_DELAY;
                self.emit(ClientEvent::HubConnected { url });
            }
            Err(e) => {
                debug!("Hub {} still unreachable: {}", hub, e);
                self.schedule_reconnect();
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        debug!("Retrying hub in {:?}", self.reconnect_delay);
        self.reconnect_at = Some(Instant::now() + self.reconnect_delay);
        self.reconnect_delay = (self.reconnect_delay * 2).min(MAX_RECONNECT_DELAY);
    }

    async fn detach(&mut self) {
        warn!("Lost connection to hub");
        self.drop_hub().await;
        self.emit(ClientEvent::HubDisconnected);
        self.schedule_reconnect();
    }

    /// Leaves the current hub and closes every peer that was negotiated
    /// through it. Room, nickname and transmit state are kept.
    async fn drop_hub(&mut self) {
        if let Some(relay) = self.relay.take() {
            let _ = relay.leave();
        }
        self.inbound = None;
        self.reconnect_at = None;
        self.orchestrator.reset().await;
        self.orchestrator.set_route(SignalRoute::manual());
        self.emit(ClientEvent::Participants(Vec::new()));
    }

    fn spawn_discovery(&self) {
        let mut options = self.discovery.clone();
        if options.stored_url.is_none() {
            options.stored_url = self.prefs.get(PrefKey::LastHub);
        }
        let tx = self.discovery_tx.clone();
        tokio::spawn(async move {
            let results = discover(&options).await;
            let _ = tx.send(results);
        });
    }

    async fn next_message(
        inbound: &mut Option<mpsc::UnboundedReceiver<ServerMessage>>,
    ) -> Option<ServerMessage> {
        match inbound {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    async fn wait_until(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}
