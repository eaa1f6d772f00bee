pub mod config;
pub mod events;
pub mod server;
pub mod session;

pub use config::RelayConfig;
pub use events::{ConnectionInfo, EventSink, RecordingSink, RelayEvent, TracingSink};
pub use server::{RelayState, router, run_server, serve};
pub use session::{interpret, run_session};
