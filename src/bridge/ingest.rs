//! Console ingest pipeline.
//!
//! Every line read from the game console passes through here: the raid
//! collector and roster parser see it first, then it is published to the
//! hub for route matching.

use std::sync::Arc;

use tracing::debug;

use crate::common::{Event, TransportId};
use crate::parsers::{RaidCollector, RosterOutcome, RosterParser};
use crate::presence::PresenceStore;

use super::channels::HubHandle;
use super::notify::player_change_message;

/// Custom trigger fired when the console connects.
pub const SERVER_UP: &str = "serverup";
/// Custom trigger fired when the console disconnects.
pub const SERVER_DOWN: &str = "serverdown";

pub struct ConsoleIngest {
    source: TransportId,
    hub: HubHandle,
    roster: RosterParser,
    raid: Option<RaidCollector>,
    /// Gateway channel for login/logout notices.
    notify_channel: Option<String>,
}

impl ConsoleIngest {
    pub fn new(source: TransportId, store: Arc<PresenceStore>, hub: HubHandle) -> Self {
        Self {
            source,
            hub,
            roster: RosterParser::new(store),
            raid: None,
            notify_channel: None,
        }
    }

    pub fn with_raid(mut self, raid: RaidCollector) -> Self {
        self.raid = Some(raid);
        self
    }

    pub fn with_player_notifications(mut self, channel_id: impl Into<String>) -> Self {
        self.notify_channel = Some(channel_id.into()).filter(|c: &String| !c.is_empty());
        self
    }

    pub fn on_connect(&mut self) {
        self.roster.reset();
        self.hub.custom(self.source, SERVER_UP);
    }

    pub fn on_disconnect(&mut self) {
        self.hub.custom(self.source, SERVER_DOWN);
    }

    /// Process one console line.
    pub fn handle_line(&mut self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return;
        }

        if let Some(raid) = &self.raid {
            raid.process_line(line);
        }

        if let RosterOutcome::Completed { changes } = self.roster.feed(line) {
            if let Some(channel) = &self.notify_channel {
                for change in &changes {
                    let text = player_change_message(change);
                    self.hub.direct(
                        TransportId::Discord,
                        Event::new(self.source, change.name.as_str(), channel.as_str(), text),
                    );
                }
            } else if !changes.is_empty() {
                debug!("{} player change(s), notifications disabled", changes.len());
            }
        }

        self.hub.publish(Event::line(self.source, line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::channels::{ChannelBundle, HubInput};
    use crate::parsers::compile_start_markers;
    use tokio::sync::mpsc;

    fn record(name: &str) -> String {
        format!(
            " [60 Warrior] {} (Human) <G> zone: qeynos AccID: 1 AccName: a LSID: 2 Status: 0",
            name
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<HubInput>) -> Vec<HubInput> {
        let mut inputs = Vec::new();
        while let Ok(input) = rx.try_recv() {
            inputs.push(input);
        }
        inputs
    }

    #[tokio::test]
    async fn test_lines_published_to_hub() {
        let mut bundle = ChannelBundle::new();
        let mut ingest = ConsoleIngest::new(
            TransportId::Telnet,
            Arc::new(PresenceStore::new()),
            bundle.hub.clone(),
        );

        ingest.handle_line("Alice says ooc, 'hi'\r");
        ingest.handle_line("   ");

        assert_eq!(
            drain(&mut bundle.hub_rx),
            vec![HubInput::Event(Event::line(
                TransportId::Telnet,
                "Alice says ooc, 'hi'"
            ))]
        );
    }

    #[tokio::test]
    async fn test_connect_fires_serverup_and_notifications_follow_first_dump() {
        let mut bundle = ChannelBundle::new();
        let store = Arc::new(PresenceStore::new());
        let mut ingest = ConsoleIngest::new(TransportId::Telnet, store, bundle.hub.clone())
            .with_player_notifications("777");

        let alice = record("Alice");
        let bob = record("Bob");

        ingest.on_connect();
        for line in ["Players on server:", alice.as_str(), "1 players online"] {
            ingest.handle_line(line);
        }
        let inputs = drain(&mut bundle.hub_rx);
        assert!(matches!(&inputs[0], HubInput::Custom { name, .. } if name == SERVER_UP));
        assert!(!inputs
            .iter()
            .any(|i| matches!(i, HubInput::Direct { .. })));

        for line in ["Players on server:", bob.as_str(), "1 players online"] {
            ingest.handle_line(line);
        }
        let notices: Vec<Event> = drain(&mut bundle.hub_rx)
            .into_iter()
            .filter_map(|i| match i {
                HubInput::Direct { target, event } => {
                    assert_eq!(target, TransportId::Discord);
                    Some(event)
                }
                _ => None,
            })
            .collect();
        assert_eq!(notices.len(), 2);
        assert!(notices[0].message.contains("**Bob** has logged in"));
        assert!(notices[1].message.contains("**Alice** has logged off"));
        assert_eq!(notices[0].channel_ref, "777");
    }

    #[tokio::test]
    async fn test_raid_lines_reach_collector() {
        let bundle = ChannelBundle::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let raid = RaidCollector::new(compile_start_markers(None).unwrap(), tx);
        let mut ingest = ConsoleIngest::new(
            TransportId::Telnet,
            Arc::new(PresenceStore::new()),
            bundle.hub.clone(),
        )
        .with_raid(raid);

        for line in ["Raid Members:", "1 | A | 60 | Warrior", "1 total raid members"] {
            ingest.handle_line(line);
        }
        assert_eq!(rx.recv().await.unwrap()[0].name, "A");
    }

    #[tokio::test]
    async fn test_disconnect_fires_serverdown() {
        let mut bundle = ChannelBundle::new();
        let mut ingest = ConsoleIngest::new(
            TransportId::Telnet,
            Arc::new(PresenceStore::new()),
            bundle.hub.clone(),
        );
        ingest.on_disconnect();
        assert_eq!(
            drain(&mut bundle.hub_rx),
            vec![HubInput::Custom {
                source: TransportId::Telnet,
                name: SERVER_DOWN.to_string()
            }]
        );
    }
}
