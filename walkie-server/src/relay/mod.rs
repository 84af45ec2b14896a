mod registry;
mod relay_command;
mod relay_handle;
mod relay_server;

pub use registry::*;
pub use relay_command::*;
pub use relay_handle::*;
pub use relay_server::*;
