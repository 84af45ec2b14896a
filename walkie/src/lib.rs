pub use walkie_core::model::{Participant, ParticipantId, RoomId};

pub mod model {
    pub use walkie_core::model::*;
}

pub mod codec {
    pub use walkie_core::codec::*;
}

pub mod net {
    pub use walkie_core::net::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use walkie_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use walkie_client::*;
}
