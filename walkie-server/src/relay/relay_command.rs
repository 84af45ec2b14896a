use crate::relay::registry::HubSnapshot;
use tokio::sync::oneshot;
use walkie_core::{ClientMessage, ParticipantId};

/// Commands delivered to the relay from the transport layer.
#[derive(Debug)]
pub enum RelayCommand {
    /// A parsed message arrived on the connection `conn`.
    Inbound {
        conn: ParticipantId,
        message: ClientMessage,
    },

    /// The websocket of `conn` closed.
    Disconnect { conn: ParticipantId },

    /// Read-only view for the status endpoints.
    Snapshot { reply: oneshot::Sender<HubSnapshot> },
}
