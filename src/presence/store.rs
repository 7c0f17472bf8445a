//! Presence state store.
//!
//! Holds the latest roster snapshot reported by the game server and
//! computes arrivals/departures whenever a new snapshot replaces it.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::common::{Character, PlayerChange};

/// Maximum number of names listed by [`PresenceStore::online_summary`].
pub const SUMMARY_LIMIT: usize = 20;

/// A roster snapshot keyed by character name.
pub type Roster = BTreeMap<String, Character>;

#[derive(Debug, Default)]
struct PresenceState {
    characters: Roster,
    online_count: usize,
}

/// Shared roster store.
///
/// Wrap in an `Arc` to share between the console ingest pipeline and
/// the gateway's `!who` command.
#[derive(Debug, Default)]
pub struct PresenceStore {
    state: RwLock<PresenceState>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot and return what changed.
    ///
    /// Arrivals come first, then departures, each in name order.
    /// An empty roster is a valid snapshot: everybody departs.
    pub fn replace(&self, roster: Roster) -> Vec<PlayerChange> {
        let mut state = self.state.write();

        let arrivals = roster
            .iter()
            .filter(|(name, _)| !state.characters.contains_key(*name))
            .map(|(_, c)| change(c, true));
        let departures = state
            .characters
            .iter()
            .filter(|(name, _)| !roster.contains_key(*name))
            .map(|(_, c)| change(c, false));
        let changes: Vec<PlayerChange> = arrivals.chain(departures).collect();

        state.online_count = roster.len();
        state.characters = roster;
        debug!("Presence: {} online, {} change(s)", state.online_count, changes.len());
        changes
    }

    /// Number of players the server last reported online.
    pub fn online_count(&self) -> usize {
        self.state.read().online_count
    }

    /// Update the online count from a standalone summary line.
    pub fn set_online_count(&self, count: usize) {
        self.state.write().online_count = count;
    }

    /// Human-readable `who` answer.
    ///
    /// `filter` is a case-sensitive substring matched against name or zone;
    /// an empty filter lists everybody. Anonymous and role-play characters
    /// only contribute to the hidden count.
    pub fn online_summary(&self, filter: &str) -> String {
        let state = self.state.read();

        let mut hidden = 0;
        let mut names = Vec::new();
        for character in state.characters.values() {
            if character.is_hidden() {
                hidden += 1;
                continue;
            }
            if !filter.is_empty()
                && !character.name.contains(filter)
                && !character.zone.contains(filter)
            {
                continue;
            }
            names.push(character.name.as_str());
        }

        let hidden_text = if hidden > 0 {
            format!("({} hidden) ", hidden)
        } else {
            String::new()
        };
        if names.is_empty() {
            return format!("There are 0 players {}online.", hidden_text);
        }

        let total = names.len();
        let truncated_text = if total > SUMMARY_LIMIT { " (truncated)" } else { "" };
        let mut listing = String::new();
        for name in names.iter().take(SUMMARY_LIMIT) {
            listing.push_str(name);
            listing.push('\n');
        }

        if filter.is_empty() {
            format!(
                "There are {} players {}online{}:\n{}",
                total, hidden_text, truncated_text, listing
            )
        } else {
            format!(
                "There are {} players {}who match '{}'{}:\n{}",
                total, hidden_text, filter, truncated_text, listing
            )
        }
    }
}

fn change(character: &Character, online: bool) -> PlayerChange {
    PlayerChange {
        name: character.name.clone(),
        class: character.class.clone(),
        level: character.level,
        zone: character.zone.clone(),
        online,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character(name: &str, zone: &str) -> Character {
        Character {
            name: name.to_string(),
            zone: zone.to_string(),
            level: 60,
            class: "Warrior".to_string(),
            online: true,
            ..Default::default()
        }
    }

    fn roster(names: &[&str]) -> Roster {
        names
            .iter()
            .map(|n| (n.to_string(), character(n, "qeynos")))
            .collect()
    }

    #[test]
    fn test_replace_reports_symmetric_difference() {
        let store = PresenceStore::new();
        store.replace(roster(&["Alice", "Bob"]));

        let changes = store.replace(roster(&["Bob", "Carol"]));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].name, "Carol");
        assert!(changes[0].online);
        assert_eq!(changes[1].name, "Alice");
        assert!(!changes[1].online);
    }

    #[test]
    fn test_replace_is_idempotent_once_converged() {
        let store = PresenceStore::new();
        store.replace(roster(&["Alice"]));
        store.replace(roster(&["Alice", "Bob"]));
        assert!(store.replace(roster(&["Alice", "Bob"])).is_empty());
    }

    #[test]
    fn test_empty_roster_is_valid() {
        let store = PresenceStore::new();
        store.replace(roster(&["Alice", "Bob"]));

        let changes = store.replace(Roster::new());
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| !c.online));
        assert_eq!(store.online_count(), 0);
    }

    #[test]
    fn test_change_carries_character_details() {
        let store = PresenceStore::new();
        let changes = store.replace(roster(&["Alice"]));
        assert_eq!(
            changes[0],
            PlayerChange {
                name: "Alice".to_string(),
                class: "Warrior".to_string(),
                level: 60,
                zone: "qeynos".to_string(),
                online: true,
            }
        );
    }

    #[test]
    fn test_online_count() {
        let store = PresenceStore::new();
        store.replace(roster(&["Alice", "Bob"]));
        assert_eq!(store.online_count(), 2);
        store.set_online_count(57);
        assert_eq!(store.online_count(), 57);
    }

    #[test]
    fn test_summary_empty() {
        let store = PresenceStore::new();
        assert_eq!(store.online_summary(""), "There are 0 players online.");
    }

    #[test]
    fn test_summary_lists_and_hides() {
        let store = PresenceStore::new();
        let mut snapshot = roster(&["Alice", "Bob"]);
        let mut anon = character("Sneaky", "qeynos");
        anon.state = "ANON".to_string();
        snapshot.insert(anon.name.clone(), anon);
        let mut rp = character("Actor", "qeynos");
        rp.state = "RolePlay".to_string();
        snapshot.insert(rp.name.clone(), rp);
        store.replace(snapshot);

        assert_eq!(
            store.online_summary(""),
            "There are 2 players (2 hidden) online:\nAlice\nBob\n"
        );
    }

    #[test]
    fn test_summary_filter_matches_name_or_zone() {
        let store = PresenceStore::new();
        let mut snapshot = roster(&["Alice", "Bob"]);
        snapshot.insert("Carol".to_string(), character("Carol", "freeport"));
        store.replace(snapshot);

        assert_eq!(
            store.online_summary("free"),
            "There are 1 players who match 'free':\nCarol\n"
        );
        assert_eq!(
            store.online_summary("Ali"),
            "There are 1 players who match 'Ali':\nAlice\n"
        );
        // Case-sensitive
        assert_eq!(store.online_summary("alice"), "There are 0 players online.");
    }

    #[test]
    fn test_summary_truncates_at_limit() {
        let store = PresenceStore::new();
        let names: Vec<String> = (0..25).map(|i| format!("Player{:02}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        store.replace(roster(&refs));

        let summary = store.online_summary("");
        assert!(summary.starts_with("There are 25 players online (truncated):\n"));
        assert_eq!(summary.lines().count(), 1 + SUMMARY_LIMIT);
        assert!(!summary.contains("Player24"));
    }
}
