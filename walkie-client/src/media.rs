//! Handles passed between the orchestrator and the capture/playback layer.
//!
//! The orchestrator never touches audio samples. It attaches a
//! [`LocalAudio`] track to peer connections and hands every inbound
//! [`RemoteAudio`] track to the host for playback.

use crate::error::MediaFault;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// The local microphone track. Cloning shares the same track.
#[derive(Clone)]
pub struct LocalAudio {
    track: Arc<TrackLocalStaticSample>,
}

impl LocalAudio {
    pub fn new(track: Arc<TrackLocalStaticSample>) -> Self {
        Self { track }
    }

    /// A mono 48 kHz Opus track the host writes encoded samples into.
    pub fn opus(stream_id: &str) -> Self {
        Self::new(Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 1,
                ..Default::default()
            },
            "audio".to_owned(),
            stream_id.to_owned(),
        )))
    }

    pub fn track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.track)
    }

    pub fn same_track(&self, other: &LocalAudio) -> bool {
        Arc::ptr_eq(&self.track, &other.track)
    }
}

impl fmt::Debug for LocalAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalAudio")
            .field("stream_id", &self.track.stream_id())
            .finish()
    }
}

/// Inbound audio from one remote peer.
#[derive(Clone)]
pub struct RemoteAudio {
    track: Arc<TrackRemote>,
}

impl RemoteAudio {
    pub fn new(track: Arc<TrackRemote>) -> Self {
        Self { track }
    }

    pub fn track(&self) -> Arc<TrackRemote> {
        Arc::clone(&self.track)
    }
}

impl fmt::Debug for RemoteAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAudio")
            .field("ssrc", &self.track.ssrc())
            .finish()
    }
}

/// Source of the local microphone track.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn acquire(&self) -> Result<LocalAudio, MediaFault>;
    async fn release(&self, audio: LocalAudio);
}

/// Capture backed by a sample track the host feeds.
///
/// `acquire` creates the track on first use and `release` drops it, so a
/// later `acquire` starts a fresh stream.
pub struct TrackCapture {
    stream_id: String,
    current: Mutex<Option<LocalAudio>>,
}

impl TrackCapture {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            current: Mutex::new(None),
        }
    }

    /// The live track, if the microphone is open.
    pub async fn current(&self) -> Option<LocalAudio> {
        self.current.lock().await.clone()
    }
}

impl Default for TrackCapture {
    fn default() -> Self {
        Self::new("walkie")
    }
}

#[async_trait]
impl AudioCapture for TrackCapture {
    async fn acquire(&self) -> Result<LocalAudio, MediaFault> {
        let mut current = self.current.lock().await;
        if let Some(audio) = current.as_ref() {
            return Ok(audio.clone());
        }

        let audio = LocalAudio::opus(&self.stream_id);
        info!("Opened local audio track '{}'", self.stream_id);
        *current = Some(audio.clone());
        Ok(audio)
    }

    async fn release(&self, audio: LocalAudio) {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(|c| c.same_track(&audio)) {
            debug!("Closed local audio track '{}'", self.stream_id);
            *current = None;
        }
    }
}
