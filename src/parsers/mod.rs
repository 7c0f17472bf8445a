//! Console stream parsers.
//!
//! Both parsers are line-at-a-time state machines fed by the console
//! ingest pipeline.

pub mod raid;
pub mod roster;

pub use raid::{compile_start_markers, RaidCollector};
pub use roster::{RosterOutcome, RosterParser};
