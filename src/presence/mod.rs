//! Player presence tracking.

pub mod store;

pub use store::{PresenceStore, Roster};
