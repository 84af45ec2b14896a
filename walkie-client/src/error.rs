use thiserror::Error;
use walkie_core::{CodecError, ParticipantId};

/// Why the local microphone could not be opened.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaFault {
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("no microphone found")]
    DeviceNotFound,
    #[error("microphone is in use by another application")]
    DeviceBusy,
    #[error("microphone unavailable: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// One remote peer failed to produce or accept a description. Other
    /// peers are unaffected.
    #[error("negotiation with {remote} failed: {reason}")]
    NegotiationRejected {
        remote: ParticipantId,
        reason: String,
    },

    #[error(transparent)]
    MediaUnavailable(#[from] MediaFault),

    #[error("relay connection is closed")]
    RelayClosed,

    #[error("could not connect to relay: {0}")]
    RelayConnect(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("expected an {expected} payload")]
    UnexpectedPayload { expected: &'static str },

    #[error("preference store error: {0}")]
    Preferences(String),
}

impl ClientError {
    pub(crate) fn rejected(remote: &ParticipantId, err: impl std::fmt::Display) -> Self {
        Self::NegotiationRejected {
            remote: remote.clone(),
            reason: err.to_string(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
