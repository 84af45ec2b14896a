use std::collections::BTreeMap;
use std::mem;

use thiserror::Error;
use walkie_core::{
    HubStatus, Participant, ParticipantId, PresenceByRoom, PresenceEntry, RoomId, ServerMessage,
    Signal,
};

/// A message the registry wants sent to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ParticipantId,
    pub message: ServerMessage,
}

/// Why a relayed signal was not forwarded. Never reported to the sender.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Dropped {
    #[error("sender has not joined a room")]
    UnknownSender,
    #[error("message has no target")]
    MissingTarget,
    #[error("target is not a connected participant")]
    UnknownTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HubSnapshot {
    pub status: HubStatus,
    pub presence: PresenceByRoom,
}

/// Room membership of every joined connection.
///
/// Operations only compute the deliveries they cause; sending them is the
/// caller's job. Participants keep their join order, which is also the
/// order of every presence list.
#[derive(Debug, Default)]
pub struct Registry {
    participants: Vec<Participant>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.get(id).is_some()
    }

    pub fn presence(&self, room: &RoomId) -> Vec<Participant> {
        self.participants
            .iter()
            .filter(|p| &p.room == room)
            .cloned()
            .collect()
    }

    /// Adds or updates `conn` and broadcasts the room's list to its members.
    /// Moving to another room also refreshes the room that was left.
    pub fn join(
        &mut self,
        conn: &ParticipantId,
        nickname: Option<&str>,
        room: Option<&str>,
    ) -> Vec<Delivery> {
        let room = RoomId::parse(room);
        let participant = Participant::new(conn.clone(), nickname, room.clone());

        let previous_room = match self.participants.iter().position(|p| &p.id == conn) {
            Some(index) => Some(mem::replace(&mut self.participants[index], participant).room),
            None => {
                self.participants.push(participant);
                None
            }
        };

        let mut deliveries = self.broadcast(&room);
        if let Some(previous) = previous_room.filter(|r| r != &room) {
            deliveries.extend(self.broadcast(&previous));
        }
        deliveries
    }

    pub fn request_presence(&self, conn: &ParticipantId, room: Option<&str>) -> Delivery {
        let room = RoomId::parse(room);
        Delivery {
            to: conn.clone(),
            message: ServerMessage::PresenceList {
                participants: self.presence(&room),
            },
        }
    }

    /// Removes `conn`. Unknown connections produce no deliveries.
    pub fn leave(&mut self, conn: &ParticipantId) -> Vec<Delivery> {
        let Some(index) = self.participants.iter().position(|p| &p.id == conn) else {
            return Vec::new();
        };
        let departed = self.participants.remove(index);
        self.broadcast(&departed.room)
    }

    pub fn relay(
        &self,
        sender: &ParticipantId,
        target: &ParticipantId,
        signal: Signal,
    ) -> Result<Delivery, Dropped> {
        if !self.contains(sender) {
            return Err(Dropped::UnknownSender);
        }
        if target.is_empty() {
            return Err(Dropped::MissingTarget);
        }
        if !self.contains(target) {
            return Err(Dropped::UnknownTarget);
        }

        Ok(Delivery {
            to: target.clone(),
            message: signal.into_server_message(sender.clone()),
        })
    }

    pub fn snapshot(&self) -> HubSnapshot {
        let mut rooms: BTreeMap<String, Vec<PresenceEntry>> = BTreeMap::new();
        for p in &self.participants {
            rooms
                .entry(p.room.to_string())
                .or_default()
                .push(PresenceEntry {
                    id: p.id.clone(),
                    nickname: p.nickname.clone(),
                });
        }

        HubSnapshot {
            status: HubStatus::ok(self.participants.len() as u32),
            presence: PresenceByRoom { rooms },
        }
    }

    fn broadcast(&self, room: &RoomId) -> Vec<Delivery> {
        let participants = self.presence(room);
        participants
            .iter()
            .map(|member| Delivery {
                to: member.id.clone(),
                message: ServerMessage::PresenceList {
                    participants: participants.clone(),
                },
            })
            .collect()
    }
}
