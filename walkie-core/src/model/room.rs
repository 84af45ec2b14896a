use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub const DEFAULT: &'static str = "default";

    /// Trims the raw value; empty or missing names map to the default room.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(room) if !room.is_empty() => Self(room.to_string()),
            _ => Self::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self::parse(Some(s))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
