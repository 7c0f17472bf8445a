//! Canonical message types for bridge communication.
//!
//! This module defines the single source of truth for message types
//! passed between transport adapters and the dispatch hub.

use std::fmt;

use serde::Deserialize;

/// Identifies one transport adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportId {
    /// Chat platform gateway.
    Discord,
    /// Line-oriented game server console.
    Telnet,
    /// Tailed game client log file.
    #[serde(alias = "eq_log")]
    EqLog,
}

impl TransportId {
    /// All known transports, in supervisor polling order.
    pub const ALL: [TransportId; 3] = [TransportId::Discord, TransportId::Telnet, TransportId::EqLog];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Telnet => "telnet",
            Self::EqLog => "eqlog",
        }
    }

    /// Parse a transport name from config (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "discord" => Some(Self::Discord),
            "telnet" => Some(Self::Telnet),
            "eqlog" | "eq_log" => Some(Self::EqLog),
            _ => None,
        }
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical cross-transport message.
///
/// Events are value objects: once built they are only ever cloned or
/// used to derive new events, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Transport that produced the event.
    pub source: TransportId,
    /// Author name (empty for system lines).
    pub author: String,
    /// Channel reference: a literal ID or a symbolic name that did not resolve.
    pub channel_ref: String,
    /// Message text.
    pub message: String,
    /// Transport-specific auxiliary data (e.g. a guild identifier).
    pub extra: String,
}

impl Event {
    /// An event carrying a raw line, with no author or channel.
    pub fn line(source: TransportId, line: impl Into<String>) -> Self {
        Self {
            source,
            author: String::new(),
            channel_ref: String::new(),
            message: line.into(),
            extra: String::new(),
        }
    }

    pub fn new(
        source: TransportId,
        author: impl Into<String>,
        channel_ref: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            author: author.into(),
            channel_ref: channel_ref.into(),
            message: message.into(),
            extra: String::new(),
        }
    }

    /// Builder-style setter for the auxiliary field.
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }
}

/// A player arriving or leaving between two roster snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerChange {
    pub name: String,
    pub class: String,
    pub level: u32,
    pub zone: String,
    /// `true` = logged in, `false` = logged off.
    pub online: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_id_parse() {
        assert_eq!(TransportId::parse("Discord"), Some(TransportId::Discord));
        assert_eq!(TransportId::parse(" telnet "), Some(TransportId::Telnet));
        assert_eq!(TransportId::parse("eq_log"), Some(TransportId::EqLog));
        assert_eq!(TransportId::parse("nats"), None);
    }

    #[test]
    fn test_transport_id_display_round_trips() {
        for id in TransportId::ALL {
            assert_eq!(TransportId::parse(&id.to_string()), Some(id));
        }
    }

    #[test]
    fn test_event_builders() {
        let event = Event::new(TransportId::Telnet, "Alice", "123", "hi").with_extra("7");
        assert_eq!(event.author, "Alice");
        assert_eq!(event.extra, "7");

        let line = Event::line(TransportId::EqLog, "raw");
        assert!(line.author.is_empty());
        assert_eq!(line.message, "raw");
    }
}
