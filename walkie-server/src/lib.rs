mod config;
mod http;
mod relay;
mod signaling;
pub mod tls;

pub use config::HubConfig;
pub use http::{router, serve, serve_listener};
pub use relay::*;
pub use signaling::*;
