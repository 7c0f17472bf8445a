//! Roster dump parsing.
//!
//! The console answers `who` with a block of lines:
//!
//! ```text
//! Players on server:
//!   [60 Warrior] Alice (Human) <Guild> zone: qeynos AccID: 1 AccName: alice LSID: 7 Status: 0
//!   ...
//! 2 players online
//! ```
//!
//! The parser collects the records into a pending roster and hands it to the
//! presence store when the block ends.

use std::sync::Arc;
use std::time::Duration;

use fancy_regex::Regex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::common::{Character, PlayerChange};
use crate::presence::{PresenceStore, Roster};

/// Marker that opens a roster dump.
const ROSTER_START_MARKER: &str = "Players on server:";

/// Window after a dump starts during which another start marker is ignored.
pub const ROSTER_GRACE_WINDOW: Duration = Duration::from_secs(1);

/// What the parser did with a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterOutcome {
    /// Not roster related.
    Unhandled,
    /// Consumed as part of a dump or as a count line.
    Consumed,
    /// A dump completed. `changes` is empty when notifications are suppressed.
    Completed { changes: Vec<PlayerChange> },
}

#[derive(Debug)]
enum RosterState {
    Idle,
    Collecting { started: Instant, pending: Roster },
}

/// Line-at-a-time roster dump state machine.
pub struct RosterParser {
    store: Arc<PresenceStore>,
    state: RosterState,
    /// Suppress changes from the first dump after a (re)connect.
    initial_dump: bool,
    grace: Duration,
    record_pattern: Regex,
    count_pattern: Regex,
}

impl RosterParser {
    pub fn new(store: Arc<PresenceStore>) -> Self {
        Self {
            store,
            state: RosterState::Idle,
            initial_dump: true,
            grace: ROSTER_GRACE_WINDOW,
            record_pattern: Regex::new(
                r"(.*) \[([a-zA-Z]+)? ?([0-9]+) (.*)\] (.*) \((.*)\) .* zone\: (.*) AccID: (.*) AccName: (.*) LSID: (.*) Status: (.*)",
            )
            .unwrap(),
            count_pattern: Regex::new(r"([0-9]+) players online").unwrap(),
        }
    }

    /// Forget any partial dump and treat the next dump as the initial one.
    ///
    /// Called whenever the console transport (re)connects.
    pub fn reset(&mut self) {
        self.state = RosterState::Idle;
        self.initial_dump = true;
    }

    /// Feed one console line.
    pub fn feed(&mut self, line: &str) -> RosterOutcome {
        let line = line.replace('\r', "");

        if line.contains(ROSTER_START_MARKER) {
            return self.on_start_marker();
        }

        if let Some(count) = self.parse_online_count(&line) {
            if matches!(self.state, RosterState::Collecting { .. }) {
                let outcome = self.complete();
                self.store.set_online_count(count);
                return outcome;
            }
            self.store.set_online_count(count);
            return RosterOutcome::Consumed;
        }

        let RosterState::Collecting { pending, .. } = &mut self.state else {
            return RosterOutcome::Unhandled;
        };
        match parse_record(&self.record_pattern, &line) {
            Some(character) => {
                pending.insert(character.name.clone(), character);
                RosterOutcome::Consumed
            }
            None => {
                trace!("Ignoring non-roster line during dump: {}", line);
                RosterOutcome::Consumed
            }
        }
    }

    fn on_start_marker(&mut self) -> RosterOutcome {
        let now = Instant::now();
        match &self.state {
            RosterState::Collecting { started, .. } if now < *started + self.grace => {
                debug!("Ignoring repeated roster start marker inside grace window");
                RosterOutcome::Consumed
            }
            RosterState::Collecting { .. } => {
                let outcome = self.complete();
                self.begin(now);
                outcome
            }
            RosterState::Idle => {
                self.begin(now);
                RosterOutcome::Consumed
            }
        }
    }

    fn begin(&mut self, now: Instant) {
        self.state = RosterState::Collecting {
            started: now,
            pending: Roster::new(),
        };
    }

    fn complete(&mut self) -> RosterOutcome {
        let pending = match std::mem::replace(&mut self.state, RosterState::Idle) {
            RosterState::Collecting { pending, .. } => pending,
            RosterState::Idle => return RosterOutcome::Unhandled,
        };

        let changes = self.store.replace(pending);
        if self.initial_dump {
            self.initial_dump = false;
            debug!(
                "Suppressing {} player change(s) from initial roster dump",
                changes.len()
            );
            return RosterOutcome::Completed {
                changes: Vec::new(),
            };
        }
        RosterOutcome::Completed { changes }
    }

    fn parse_online_count(&self, line: &str) -> Option<usize> {
        let caps = self.count_pattern.captures(line).ok()??;
        caps.get(1)?.as_str().parse().ok()
    }
}

/// Parse one roster record. Numeric fields that fail to parse become 0.
fn parse_record(pattern: &Regex, line: &str) -> Option<Character> {
    let caps = pattern.captures(line).ok()??;
    let field = |i: usize| caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default();
    let name = field(5);
    if name.is_empty() {
        return None;
    }

    Some(Character {
        identity: field(1),
        state: field(2),
        level: field(3).trim().parse().unwrap_or(0),
        class: field(4),
        name,
        race: field(6),
        zone: field(7),
        account_id: field(8).trim().parse().unwrap_or(0),
        account_name: field(9),
        login_server_id: field(10).trim().parse().unwrap_or(0),
        status: field(11).trim().parse().unwrap_or(0),
        online: true,
    })
}
