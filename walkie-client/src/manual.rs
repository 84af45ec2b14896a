//! Pairing two devices without a hub by exchanging printable tokens.
//!
//! The offering side calls [`ManualSession::create_offer`] and shows the
//! token; the other side passes it to [`ManualSession::accept_offer`] and
//! shows the answer token, which the first side feeds to
//! [`ManualSession::accept_answer`].

use crate::error::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::media::AudioCapture;
use crate::peer::{Delivery, LinkEvent, PeerLinkFactory, PeerOrchestrator, SignalRoute};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use walkie_core::{ManualPayload, ParticipantId, PayloadKind};

pub struct ManualSession {
    orchestrator: PeerOrchestrator,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    remote: ParticipantId,
}

impl ManualSession {
    pub fn new(
        factory: Arc<dyn PeerLinkFactory>,
        capture: Arc<dyn AudioCapture>,
        gather_timeout: Duration,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        let (orchestrator, link_rx) = PeerOrchestrator::new(
            factory,
            capture,
            SignalRoute::Manual { gather_timeout },
            events,
        );
        Self {
            orchestrator,
            link_rx,
            remote: ParticipantId::manual(),
        }
    }

    pub fn orchestrator(&self) -> &PeerOrchestrator {
        &self.orchestrator
    }

    /// Opens the microphone so it is attached to the negotiated link.
    pub async fn start_transmit(&mut self) -> ClientResult<()> {
        self.orchestrator.start_mic().await?;
        Ok(())
    }

    pub async fn stop_transmit(&mut self) {
        self.orchestrator.stop_mic().await;
    }

    pub async fn create_offer(&mut self) -> ClientResult<String> {
        let delivery = self.orchestrator.call(self.remote.clone()).await?;
        let token = self.token(delivery)?;
        info!("Manual offer ready ({} chars)", token.len());
        Ok(token)
    }

    /// Answers an offer token, returning the answer token.
    pub async fn accept_offer(&mut self, token: &str) -> ClientResult<String> {
        let payload = ManualPayload::decode(token)?;
        if payload.kind != PayloadKind::Offer {
            return Err(ClientError::UnexpectedPayload { expected: "offer" });
        }

        let delivery = self
            .orchestrator
            .handle_offer(self.remote.clone(), payload.description)
            .await?;
        self.token(delivery)
    }

    pub async fn accept_answer(&mut self, token: &str) -> ClientResult<()> {
        let payload = ManualPayload::decode(token)?;
        if payload.kind != PayloadKind::Answer {
            return Err(ClientError::UnexpectedPayload { expected: "answer" });
        }

        self.orchestrator
            .handle_answer(self.remote.clone(), payload.description)
            .await
    }

    /// Waits for the next link callback and applies it.
    ///
    /// The session keeps its own link sender alive, so this only returns
    /// once a callback has been handled.
    pub async fn process_next_event(&mut self) {
        if let Some(event) = self.link_rx.recv().await {
            self.orchestrator.handle_link_event(event).await;
        }
    }

    pub async fn close(&mut self) {
        self.orchestrator.stop_mic().await;
        self.orchestrator.remove_peer(&self.remote).await;
    }

    fn token(&self, delivery: Delivery) -> ClientResult<String> {
        match delivery {
            Delivery::Payload(payload) => Ok(payload.encode()?),
            other => Err(ClientError::rejected(
                &self.remote,
                format!("no payload produced ({other:?})"),
            )),
        }
    }
}
