pub mod codec;
pub mod model;
pub mod net;

pub use codec::{CodecError, ManualPayload, PayloadKind, SCHEME_PREFIX};
pub use model::*;
