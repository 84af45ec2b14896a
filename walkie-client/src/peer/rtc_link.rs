use crate::media::{LocalAudio, RemoteAudio};
use crate::peer::link::{LinkEvent, LinkState, PeerLink, PeerLinkFactory};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use walkie_core::{IceCandidate, ParticipantId, SdpKind, SessionDescription};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_remote::TrackRemote;
use webrtc::track::track_local::TrackLocal;

/// ICE configuration for every link.
#[derive(Debug, Clone, Default)]
pub struct RtcConfig {
    /// STUN/TURN urls. Empty keeps negotiation to host candidates, which is
    /// all a LAN needs.
    pub ice_servers: Vec<String>,
}

/// [`PeerLink`] over a `webrtc` peer connection.
pub struct RtcPeerLink {
    remote: ParticipantId,
    peer_connection: Arc<RTCPeerConnection>,
    audio_senders: Mutex<Vec<Arc<RTCRtpSender>>>,
}

impl RtcPeerLink {
    pub async fn new(
        remote: ParticipantId,
        config: &RtcConfig,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = if config.ice_servers.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: config.ice_servers.clone(),
                ..Default::default()
            }]
        };
        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = events.clone();
        let remote_state = remote.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let remote = remote_state.clone();

                Box::pin(async move {
                    info!("Peer connection state for {}: {}", remote, s);
                    let _ = tx.send(LinkEvent::StateChanged {
                        remote,
                        state: link_state(s),
                    });
                })
            },
        ));

        let ice_tx = events.clone();
        let remote_ice = remote.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let remote = remote_ice.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let _ = tx.send(LinkEvent::LocalCandidate {
                    remote,
                    candidate: from_rtc_candidate(init),
                });
            })
        }));

        let track_tx = events;
        let remote_track = remote.clone();
        peer_connection.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            let tx = track_tx.clone();
            let remote = remote_track.clone();

            Box::pin(async move {
                if track.kind() != RTPCodecType::Audio {
                    debug!("Ignoring {:?} track from {}", track.kind(), remote);
                    return;
                }
                info!("Receiving audio from {}", remote);
                let _ = tx.send(LinkEvent::RemoteAudio {
                    remote,
                    audio: RemoteAudio::new(track),
                });
            })
        }));

        Ok(Self {
            remote,
            peer_connection,
            audio_senders: Mutex::new(Vec::new()),
        })
    }

    /// Drains RTCP for `sender` until the track is removed.
    fn spawn_rtcp_reader(sender: Arc<RTCRtpSender>) {
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });
    }
}

#[async_trait]
impl PeerLink for RtcPeerLink {
    async fn create_offer(&self) -> Result<SessionDescription> {
        // Without a local track the offer still needs an audio section to
        // receive the remote side's microphone.
        if self.peer_connection.get_transceivers().await.is_empty() {
            self.peer_connection
                .add_transceiver_from_kind(
                    RTPCodecType::Audio,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await
                .context("Failed to add audio transceiver")?;
        }

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        from_rtc_description(answer)
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc_description(description)?)
            .await
            .context("Failed to set local description")?;
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc_description(description)?)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(to_rtc_candidate(candidate))
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn attach_audio(&self, audio: &LocalAudio) -> Result<()> {
        let mut senders = self.audio_senders.lock().await;
        if !senders.is_empty() {
            return Ok(());
        }

        let sender = self
            .peer_connection
            .add_track(audio.track() as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .context("Failed to add audio track")?;
        Self::spawn_rtcp_reader(Arc::clone(&sender));
        senders.push(sender);
        debug!("Attached local audio to {}", self.remote);
        Ok(())
    }

    async fn detach_audio(&self) -> Result<()> {
        let senders: Vec<_> = self.audio_senders.lock().await.drain(..).collect();
        for sender in senders {
            self.peer_connection
                .remove_track(&sender)
                .await
                .context("Failed to remove audio track")?;
        }
        Ok(())
    }

    async fn wait_for_gathering(&self, timeout: Duration) {
        let mut gathering_complete = self.peer_connection.gathering_complete_promise().await;
        if tokio::time::timeout(timeout, gathering_complete.recv())
            .await
            .is_err()
        {
            warn!(
                "ICE gathering for {} timed out after {:?}, continuing with partial candidates",
                self.remote, timeout
            );
        }
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let description = self.peer_connection.local_description().await?;
        from_rtc_description(description).ok()
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .context("Failed to close peer connection")?;
        Ok(())
    }
}

/// Creates an [`RtcPeerLink`] per remote participant.
#[derive(Debug, Clone, Default)]
pub struct RtcLinkFactory {
    config: RtcConfig,
}

impl RtcLinkFactory {
    pub fn new(config: RtcConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PeerLinkFactory for RtcLinkFactory {
    async fn create(
        &self,
        remote: ParticipantId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Box<dyn PeerLink>> {
        let link = RtcPeerLink::new(remote, &self.config, events).await?;
        Ok(Box::new(link))
    }
}

fn link_state(state: RTCPeerConnectionState) -> LinkState {
    match state {
        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => LinkState::New,
        RTCPeerConnectionState::Connecting => LinkState::Connecting,
        RTCPeerConnectionState::Connected => LinkState::Connected,
        RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
        RTCPeerConnectionState::Failed => LinkState::Failed,
        RTCPeerConnectionState::Closed => LinkState::Closed,
    }
}

fn to_rtc_description(description: SessionDescription) -> Result<RTCSessionDescription> {
    let SessionDescription { kind, sdp } = description;
    Ok(match kind {
        SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
        SdpKind::Pranswer => RTCSessionDescription::pranswer(sdp)?,
        SdpKind::Rollback => bail!("rollback descriptions are not supported"),
    })
}

fn from_rtc_description(description: RTCSessionDescription) -> Result<SessionDescription> {
    let kind = match description.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Answer => SdpKind::Answer,
        RTCSdpType::Pranswer => SdpKind::Pranswer,
        RTCSdpType::Rollback => SdpKind::Rollback,
        RTCSdpType::Unspecified => bail!("session description has no type"),
    };
    Ok(SessionDescription {
        kind,
        sdp: description.sdp,
    })
}

fn to_rtc_candidate(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_m_line_index,
        username_fragment: candidate.username_fragment,
    }
}

fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_m_line_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}
