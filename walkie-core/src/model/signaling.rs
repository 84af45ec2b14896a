use crate::model::participant::{Participant, ParticipantId};
use crate::model::session::{IceCandidate, SessionDescription};
use serde::{Deserialize, Deserializer, Serialize};

/// Messages a client sends to the hub.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    Join {
        #[serde(default, deserialize_with = "lenient_string")]
        nickname: Option<String>,
        #[serde(default, deserialize_with = "lenient_string")]
        room: Option<String>,
    },
    RequestPresence {
        #[serde(default, deserialize_with = "lenient_string")]
        room: Option<String>,
    },
    Leave,
    Offer {
        target_id: ParticipantId,
        sdp: SessionDescription,
    },
    Answer {
        target_id: ParticipantId,
        sdp: SessionDescription,
    },
    Ice {
        target_id: ParticipantId,
        candidate: IceCandidate,
    },
}

impl ClientMessage {
    /// Splits a relayable message into its target and body.
    pub fn into_relay(self) -> Option<(ParticipantId, Signal)> {
        match self {
            ClientMessage::Offer { target_id, sdp } => Some((target_id, Signal::Offer(sdp))),
            ClientMessage::Answer { target_id, sdp } => Some((target_id, Signal::Answer(sdp))),
            ClientMessage::Ice {
                target_id,
                candidate,
            } => Some((target_id, Signal::Ice(candidate))),
            _ => None,
        }
    }
}

/// Messages the hub sends to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    Welcome {
        id: ParticipantId,
    },
    PresenceList {
        participants: Vec<Participant>,
    },
    Offer {
        from_id: ParticipantId,
        sdp: SessionDescription,
    },
    Answer {
        from_id: ParticipantId,
        sdp: SessionDescription,
    },
    Ice {
        from_id: ParticipantId,
        candidate: IceCandidate,
    },
}

/// Body of a negotiation message travelling between two participants.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Offer(SessionDescription),
    Answer(SessionDescription),
    Ice(IceCandidate),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Offer(_) => SignalKind::Offer,
            Signal::Answer(_) => SignalKind::Answer,
            Signal::Ice(_) => SignalKind::Ice,
        }
    }

    pub fn into_client_message(self, target_id: ParticipantId) -> ClientMessage {
        match self {
            Signal::Offer(sdp) => ClientMessage::Offer { target_id, sdp },
            Signal::Answer(sdp) => ClientMessage::Answer { target_id, sdp },
            Signal::Ice(candidate) => ClientMessage::Ice {
                target_id,
                candidate,
            },
        }
    }

    pub fn into_server_message(self, from_id: ParticipantId) -> ServerMessage {
        match self {
            Signal::Offer(sdp) => ServerMessage::Offer { from_id, sdp },
            Signal::Answer(sdp) => ServerMessage::Answer { from_id, sdp },
            Signal::Ice(candidate) => ServerMessage::Ice { from_id, candidate },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    Ice,
}

// Non-string values are treated as absent instead of failing the message.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_str().map(str::to_string)))
}
