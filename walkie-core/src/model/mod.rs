mod participant;
mod room;
mod session;
mod signaling;
mod status;

pub use participant::{Participant, ParticipantId};
pub use room::RoomId;
pub use session::{IceCandidate, SdpKind, SessionDescription};
pub use signaling::{ClientMessage, ServerMessage, Signal, SignalKind};
pub use status::{HubStatus, PresenceByRoom, PresenceEntry};
