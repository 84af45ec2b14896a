use crate::error::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::media::{AudioCapture, LocalAudio};
use crate::peer::link::{LinkEvent, LinkState, PeerLink, PeerLinkFactory};
use crate::peer::record::{NegotiationState, PeerRecord};
use crate::peer::signal_sink::SignalSink;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use walkie_core::{
    IceCandidate, ManualPayload, Participant, ParticipantId, SdpKind, ServerMessage,
    SessionDescription, Signal,
};

/// Bound on candidate gathering before a manual payload is produced.
pub const DEFAULT_GATHER_TIMEOUT: Duration = Duration::from_millis(3000);

/// How offers, answers and candidates leave this orchestrator.
#[derive(Clone)]
pub enum SignalRoute {
    /// Trickled through the hub.
    Relay(Arc<dyn SignalSink>),
    /// Returned to the caller as one self-contained payload once gathering
    /// finished or timed out. Local candidates are not sent separately.
    Manual { gather_timeout: Duration },
}

impl SignalRoute {
    pub fn manual() -> Self {
        Self::Manual {
            gather_timeout: DEFAULT_GATHER_TIMEOUT,
        }
    }
}

/// Outcome of producing a local description.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Relayed,
    Payload(ManualPayload),
    /// Colliding offer ignored; our own outstanding offer takes precedence.
    Skipped,
}

/// Per-remote negotiation for the local participant.
///
/// Every remote id gets an independent [`PeerRecord`]. Failures are scoped
/// to the record they happened on; the dispatching entry points
/// ([`Self::handle_server_message`], [`Self::start_transmit`],
/// [`Self::reconcile`]) report them as [`ClientEvent::PeerFailed`] and carry
/// on with the other peers.
pub struct PeerOrchestrator {
    local_id: Option<ParticipantId>,
    peers: HashMap<ParticipantId, PeerRecord>,
    participants: Vec<Participant>,
    factory: Arc<dyn PeerLinkFactory>,
    capture: Arc<dyn AudioCapture>,
    route: SignalRoute,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
    events: mpsc::UnboundedSender<ClientEvent>,
    mic: Option<LocalAudio>,
    transmitting: bool,
}

impl PeerOrchestrator {
    /// Returns the orchestrator and the receiver its links report into.
    /// Feed that receiver back through [`Self::handle_link_event`].
    pub fn new(
        factory: Arc<dyn PeerLinkFactory>,
        capture: Arc<dyn AudioCapture>,
        route: SignalRoute,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            local_id: None,
            peers: HashMap::new(),
            participants: Vec::new(),
            factory,
            capture,
            route,
            link_tx,
            events,
            mic: None,
            transmitting: false,
        };
        (orchestrator, link_rx)
    }

    pub fn local_id(&self) -> Option<&ParticipantId> {
        self.local_id.as_ref()
    }

    pub fn set_local_id(&mut self, id: ParticipantId) {
        info!("Local participant id is {}", id);
        self.local_id = Some(id);
    }

    pub fn set_route(&mut self, route: SignalRoute) {
        self.route = route;
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitting
    }

    pub fn mic_active(&self) -> bool {
        self.mic.is_some()
    }

    /// Room members other than the local participant, as last reconciled.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn peer_ids(&self) -> Vec<ParticipantId> {
        self.peers.keys().cloned().collect()
    }

    pub fn state_of(&self, remote: &ParticipantId) -> Option<NegotiationState> {
        self.peers.get(remote).map(|r| r.state)
    }

    pub fn pending_ice(&self, remote: &ParticipantId) -> usize {
        self.peers.get(remote).map_or(0, |r| r.ice.pending())
    }

    /// Offers a connection to `remote`, attaching the microphone when
    /// transmitting. Calling a known peer renegotiates it.
    pub async fn call(&mut self, remote: ParticipantId) -> ClientResult<Delivery> {
        let record =
            Self::ensure_record(&mut self.peers, &*self.factory, &self.link_tx, &remote).await?;

        if let Some(mic) = &self.mic {
            record
                .link
                .attach_audio(mic)
                .await
                .map_err(|e| ClientError::rejected(&remote, e))?;
        }

        let offer = record
            .link
            .create_offer()
            .await
            .map_err(|e| ClientError::rejected(&remote, e))?;
        record
            .link
            .set_local_description(offer.clone())
            .await
            .map_err(|e| ClientError::rejected(&remote, e))?;
        record.state = NegotiationState::Offering;
        debug!("Offer created for {}", remote);

        Self::send_description(&self.route, &*record.link, &remote, offer).await
    }

    pub async fn handle_offer(
        &mut self,
        from: ParticipantId,
        offer: SessionDescription,
    ) -> ClientResult<Delivery> {
        if offer.kind != SdpKind::Offer {
            return Err(ClientError::rejected(
                &from,
                format!("expected an offer, got {:?}", offer.kind),
            ));
        }

        if self.state_of(&from) == Some(NegotiationState::Offering) {
            // Both sides offered at once. The lower id keeps its offer.
            if self.local_id.as_ref().is_some_and(|local| local < &from) {
                debug!("Offer collision with {}, keeping ours", from);
                return Ok(Delivery::Skipped);
            }
            debug!("Offer collision with {}, answering theirs", from);
            self.remove_peer(&from).await;
        }

        let record =
            Self::ensure_record(&mut self.peers, &*self.factory, &self.link_tx, &from).await?;

        if let Some(mic) = &self.mic {
            record
                .link
                .attach_audio(mic)
                .await
                .map_err(|e| ClientError::rejected(&from, e))?;
        }

        record
            .link
            .set_remote_description(offer)
            .await
            .map_err(|e| ClientError::rejected(&from, e))?;
        Self::flush_ice(record).await;

        let answer = record
            .link
            .create_answer()
            .await
            .map_err(|e| ClientError::rejected(&from, e))?;
        record
            .link
            .set_local_description(answer.clone())
            .await
            .map_err(|e| ClientError::rejected(&from, e))?;
        record.state = Self::settled_state(record);
        debug!("Answer created for {}", from);

        Self::send_description(&self.route, &*record.link, &from, answer).await
    }

    /// Applies the answer to an outstanding offer. Answers for unknown peers
    /// or peers not in `Offering` are dropped.
    pub async fn handle_answer(
        &mut self,
        from: ParticipantId,
        answer: SessionDescription,
    ) -> ClientResult<()> {
        let Some(record) = self.peers.get_mut(&from) else {
            debug!("Dropping answer from unknown peer {}", from);
            return Ok(());
        };
        if record.state != NegotiationState::Offering {
            debug!(
                "Dropping answer from {} without an outstanding offer ({:?})",
                from, record.state
            );
            return Ok(());
        }

        record
            .link
            .set_remote_description(answer)
            .await
            .map_err(|e| ClientError::rejected(&from, e))?;
        Self::flush_ice(record).await;
        record.state = Self::settled_state(record);
        Ok(())
    }

    /// Applies `candidate` once a remote description exists, queueing it
    /// until then. Candidates for unknown peers are dropped.
    pub async fn handle_ice(&mut self, from: ParticipantId, candidate: IceCandidate) {
        let Some(record) = self.peers.get_mut(&from) else {
            debug!("Dropping ICE candidate from unknown peer {}", from);
            return;
        };

        if let Some(candidate) = record.ice.admit(candidate) {
            Self::apply_candidate(record, candidate).await;
        } else {
            debug!(
                "Queued ICE candidate from {} ({} pending)",
                from,
                record.ice.pending()
            );
        }
    }

    /// Tears down the record for `remote`. Unknown ids are ignored.
    pub async fn remove_peer(&mut self, remote: &ParticipantId) {
        let Some(mut record) = self.peers.remove(remote) else {
            return;
        };
        record.state = NegotiationState::Closed;

        if let Err(e) = record.link.detach_audio().await {
            warn!("Failed to detach audio from {}: {:#}", remote, e);
        }
        if record.playback.take().is_some() {
            self.emit(ClientEvent::PlaybackReleased {
                remote: remote.clone(),
            });
        }
        if let Err(e) = record.link.close().await {
            warn!("Failed to close link to {}: {:#}", remote, e);
        }
        info!("Removed peer {}", remote);
    }

    /// Opens the microphone once. Later calls return the open track.
    pub async fn start_mic(&mut self) -> ClientResult<LocalAudio> {
        if let Some(mic) = &self.mic {
            return Ok(mic.clone());
        }

        let mic = self.capture.acquire().await?;
        info!("Microphone open");
        self.mic = Some(mic.clone());
        Ok(mic)
    }

    /// Detaches the microphone from every peer, then releases it.
    pub async fn stop_mic(&mut self) {
        let Some(mic) = self.mic.take() else {
            return;
        };

        for record in self.peers.values() {
            if let Err(e) = record.link.detach_audio().await {
                warn!("Failed to detach audio from {}: {:#}", record.remote_id, e);
            }
        }
        self.capture.release(mic).await;
        info!("Microphone released");
    }

    /// Opens the microphone and offers it to every other room member.
    pub async fn start_transmit(&mut self) -> ClientResult<()> {
        if self.transmitting {
            return Ok(());
        }
        self.start_mic().await?;
        self.transmitting = true;

        let targets: Vec<ParticipantId> = self.participants.iter().map(|p| p.id.clone()).collect();
        for remote in targets {
            self.call_contained(remote).await;
        }
        Ok(())
    }

    pub async fn stop_transmit(&mut self) {
        self.transmitting = false;
        self.stop_mic().await;
    }

    /// Applies a new authoritative participant list.
    ///
    /// Records for ids no longer listed are removed; there is no other
    /// expiry. While transmitting, newly listed participants are called.
    pub async fn reconcile(&mut self, participants: Vec<Participant>) {
        let others: Vec<Participant> = participants
            .into_iter()
            .filter(|p| Some(&p.id) != self.local_id.as_ref())
            .collect();
        let present: HashSet<&ParticipantId> = others.iter().map(|p| &p.id).collect();

        let stale: Vec<ParticipantId> = self
            .peers
            .keys()
            .filter(|id| !present.contains(id))
            .cloned()
            .collect();
        let newcomers: Vec<ParticipantId> = others
            .iter()
            .filter(|p| !self.peers.contains_key(&p.id))
            .map(|p| p.id.clone())
            .collect();

        for id in stale {
            self.remove_peer(&id).await;
        }

        self.participants = others;
        self.emit(ClientEvent::Participants(self.participants.clone()));

        if self.transmitting {
            for remote in newcomers {
                self.call_contained(remote).await;
            }
        }
    }

    /// Drops every peer, e.g. after switching hubs. Connection ids do not
    /// survive a reconnect.
    pub async fn reset(&mut self) {
        for id in self.peer_ids() {
            self.remove_peer(&id).await;
        }
        self.participants.clear();
        self.local_id = None;
    }

    /// Dispatches one hub message. Per-peer failures are reported as
    /// [`ClientEvent::PeerFailed`] and never returned.
    pub async fn handle_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Welcome { id } => self.set_local_id(id),

            ServerMessage::PresenceList { participants } => self.reconcile(participants).await,

            ServerMessage::Offer { from_id, sdp } => {
                if let Err(e) = self.handle_offer(from_id.clone(), sdp).await {
                    self.peer_failed(&from_id, e);
                }
            }

            ServerMessage::Answer { from_id, sdp } => {
                if let Err(e) = self.handle_answer(from_id.clone(), sdp).await {
                    self.peer_failed(&from_id, e);
                }
            }

            ServerMessage::Ice { from_id, candidate } => self.handle_ice(from_id, candidate).await,
        }
    }

    pub async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::LocalCandidate { remote, candidate } => {
                if !self.peers.contains_key(&remote) {
                    return;
                }
                let SignalRoute::Relay(sink) = &self.route else {
                    // Carried inside the manual payload instead.
                    return;
                };
                if let Err(e) = sink.send_signal(remote.clone(), Signal::Ice(candidate)).await {
                    warn!("Failed to send ICE candidate to {}: {}", remote, e);
                }
            }

            LinkEvent::StateChanged { remote, state } => {
                let Some(record) = self.peers.get_mut(&remote) else {
                    return;
                };
                record.transport = state;
                if state == LinkState::Connected
                    && record.state == NegotiationState::Answering
                {
                    record.state = NegotiationState::Connected;
                }
                self.emit(ClientEvent::ConnectionState {
                    remote: remote.clone(),
                    state,
                });
                if state == LinkState::Failed {
                    self.emit(ClientEvent::PeerFailed {
                        remote,
                        reason: "connection failed".to_string(),
                    });
                }
            }

            LinkEvent::RemoteAudio { remote, audio } => {
                let Some(record) = self.peers.get_mut(&remote) else {
                    return;
                };
                record.playback = Some(audio.clone());
                self.emit(ClientEvent::RemoteAudio { remote, audio });
            }
        }
    }

    async fn call_contained(&mut self, remote: ParticipantId) {
        if let Err(e) = self.call(remote.clone()).await {
            self.peer_failed(&remote, e);
        }
    }

    fn peer_failed(&self, remote: &ParticipantId, error: ClientError) {
        warn!("Peer {} failed: {}", remote, error);
        self.emit(ClientEvent::PeerFailed {
            remote: remote.clone(),
            reason: error.to_string(),
        });
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    async fn ensure_record<'a>(
        peers: &'a mut HashMap<ParticipantId, PeerRecord>,
        factory: &dyn PeerLinkFactory,
        link_tx: &mpsc::UnboundedSender<LinkEvent>,
        remote: &ParticipantId,
    ) -> ClientResult<&'a mut PeerRecord> {
        match peers.entry(remote.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let link = factory
                    .create(remote.clone(), link_tx.clone())
                    .await
                    .map_err(|e| ClientError::rejected(remote, e))?;
                debug!("Created peer record for {}", remote);
                Ok(entry.insert(PeerRecord::new(remote.clone(), link)))
            }
        }
    }

    /// Opens the ICE gate and applies queued candidates in arrival order.
    async fn flush_ice(record: &mut PeerRecord) {
        for candidate in record.ice.open() {
            Self::apply_candidate(record, candidate).await;
        }
    }

    async fn apply_candidate(record: &PeerRecord, candidate: IceCandidate) {
        if candidate.candidate.trim().is_empty() {
            debug!("End of candidates from {}", record.remote_id);
            return;
        }
        if let Err(e) = record.link.add_ice_candidate(candidate).await {
            warn!(
                "Dropping ICE candidate from {}: {:#}",
                record.remote_id, e
            );
        }
    }

    /// State once both descriptions are in place.
    fn settled_state(record: &PeerRecord) -> NegotiationState {
        if record.transport == LinkState::Connected {
            NegotiationState::Connected
        } else {
            NegotiationState::Answering
        }
    }

    async fn send_description(
        route: &SignalRoute,
        link: &dyn PeerLink,
        remote: &ParticipantId,
        description: SessionDescription,
    ) -> ClientResult<Delivery> {
        match route {
            SignalRoute::Relay(sink) => {
                let signal = match description.kind {
                    SdpKind::Offer => Signal::Offer(description),
                    _ => Signal::Answer(description),
                };
                sink.send_signal(remote.clone(), signal).await?;
                Ok(Delivery::Relayed)
            }

            SignalRoute::Manual { gather_timeout } => {
                link.wait_for_gathering(*gather_timeout).await;
                let complete = link.local_description().await.unwrap_or(description);
                let payload = match complete.kind {
                    SdpKind::Offer => ManualPayload::offer(complete),
                    _ => ManualPayload::answer(complete),
                };
                Ok(Delivery::Payload(payload))
            }
        }
    }
}
