//! Bridge core: dispatch hub, console ingest and the background loops
//! that keep transports alive.

pub mod attendance;
pub mod channels;
pub mod hub;
pub mod ingest;
pub mod notify;
pub mod supervisor;

pub use attendance::run_raid_results;
pub use channels::{ChannelBundle, HubHandle, HubInput};
pub use hub::Hub;
pub use ingest::ConsoleIngest;
pub use supervisor::{run_reconnect_loop, run_status_loop};
