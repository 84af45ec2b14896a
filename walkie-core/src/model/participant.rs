use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const MANUAL_ID: &str = "manual";

/// Identifier of one live relay connection.
///
/// The hub assigns a fresh UUID per websocket connection, so the id changes
/// every time a client reconnects.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Synthetic remote id used when pairing through a manual token.
    pub fn manual() -> Self {
        Self(MANUAL_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A connection that has joined a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub nickname: String,
    pub room: RoomId,
}

impl Participant {
    pub const DEFAULT_NICKNAME: &'static str = "Guest";

    pub fn new(id: ParticipantId, nickname: Option<&str>, room: RoomId) -> Self {
        Self {
            id,
            nickname: Self::sanitize_nickname(nickname),
            room,
        }
    }

    /// Trims the nickname, falling back to [`Self::DEFAULT_NICKNAME`].
    pub fn sanitize_nickname(raw: Option<&str>) -> String {
        match raw.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => Self::DEFAULT_NICKNAME.to_string(),
        }
    }
}
