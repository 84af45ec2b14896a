mod link;
mod orchestrator;
mod record;
mod rtc_link;
mod signal_sink;

pub use link::*;
pub use orchestrator::*;
pub use record::*;
pub use rtc_link::*;
pub use signal_sink::*;
