use crate::discovery::HubProbeResult;
use crate::error::MediaFault;
use crate::media::RemoteAudio;
use crate::peer::LinkState;
use walkie_core::{Participant, ParticipantId};

/// Everything the presentation layer needs to render a session.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Room members other than the local participant.
    Participants(Vec<Participant>),
    ConnectionState {
        remote: ParticipantId,
        state: LinkState,
    },
    RemoteAudio {
        remote: ParticipantId,
        audio: RemoteAudio,
    },
    /// Playback for `remote` must stop; its peer record is gone.
    PlaybackReleased {
        remote: ParticipantId,
    },
    PeerFailed {
        remote: ParticipantId,
        reason: String,
    },
    /// Transmit was requested but the microphone could not be opened.
    MicUnavailable(MediaFault),
    Transmitting(bool),
    HubConnected {
        url: String,
    },
    HubDisconnected,
    Discovery(Vec<HubProbeResult>),
}
