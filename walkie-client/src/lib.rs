pub mod discovery;
mod error;
mod events;
pub mod manual;
mod media;
pub mod peer;
pub mod prefs;
mod relay_client;
mod session;

pub use error::{ClientError, ClientResult, MediaFault};
pub use events::ClientEvent;
pub use manual::ManualSession;
pub use media::*;
pub use relay_client::*;
pub use session::*;
