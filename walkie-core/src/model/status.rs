use crate::model::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of the hub's `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubStatus {
    pub status: String,
    #[serde(default, alias = "users")]
    pub connected_count: Option<u32>,
}

impl HubStatus {
    pub fn ok(connected_count: u32) -> Self {
        Self {
            status: "ok".to_string(),
            connected_count: Some(connected_count),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceEntry {
    pub id: ParticipantId,
    pub nickname: String,
}

/// Body of the hub's `/presence` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PresenceByRoom {
    pub rooms: BTreeMap<String, Vec<PresenceEntry>>,
}
