//! Common utilities and types shared across the application.

pub mod error;
pub mod messages;
pub mod resources;
pub mod types;

pub use messages::{Event, PlayerChange, TransportId};
pub use resources::CharacterClass;
pub use types::{Character, RaidMember};
