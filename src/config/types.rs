//! Configuration type definitions.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::common::TransportId;

/// Lower bound for the keep-alive retry interval.
pub const MIN_KEEP_ALIVE_RETRY: Duration = Duration::from_secs(10);

/// Default per-send timeout applied by the dispatch hub.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Lower the default log level to debug.
    #[serde(default)]
    pub debug: bool,
    /// Reconnect transports that drop.
    #[serde(default = "default_true")]
    pub keep_alive: bool,
    /// Duration string between reconnect sweeps, e.g. "10s".
    #[serde(default = "default_keep_alive_retry")]
    pub keep_alive_retry: String,
    /// Duration string bounding each transport send.
    #[serde(default)]
    pub send_timeout: Option<String>,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub telnet: TelnetConfig,
    #[serde(default)]
    pub eqlog: EqLogConfig,
    #[serde(default)]
    pub raid: RaidConfig,
}

/// Chat gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub server_id: String,
    /// Presence template, e.g. "EQ: {{.PlayerCount}} Online".
    #[serde(default = "default_bot_status")]
    pub bot_status: String,
    /// Symbolic channel name -> channel ID.
    #[serde(default)]
    pub channels: HashMap<String, String>,
    /// Routes for messages arriving from the gateway.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl DiscordConfig {
    /// Resolve a symbolic channel name to an ID. Unknown names pass through.
    pub fn resolve_channel_id(&self, channel: &str) -> String {
        self.channels
            .get(channel)
            .cloned()
            .unwrap_or_else(|| channel.to_string())
    }
}

/// Game server console configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelnetConfig {
    #[serde(default)]
    pub enabled: bool,
    /// host:port of the console.
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub player_notifications: PlayerNotificationsConfig,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Arrival/departure notifications driven by roster dumps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerNotificationsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub channel_id: String,
}

/// Tailed log file configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EqLogConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub path: String,
    /// Duration string between file polls.
    #[serde(default)]
    pub poll_interval: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// Raid attendance integration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RaidConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub raid_event_id: String,
    #[serde(default)]
    pub discord_channel_id: String,
    #[serde(default)]
    pub auto_post: bool,
    #[serde(default)]
    pub notify_discord: bool,
    /// Overrides the built-in dump start markers when set.
    #[serde(default)]
    pub start_markers: Option<Vec<String>>,
}

/// A configured route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub trigger: TriggerConfig,
    /// Target transport name, e.g. "discord".
    pub target: String,
    /// Destination channel: literal ID or symbolic name.
    #[serde(default)]
    pub channel_id: String,
    /// Destination guild: literal ID or symbolic name.
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Output template, e.g. "{{.Name}} **OOC**: {{.Message}}".
    #[serde(default)]
    pub message_pattern: String,
}

/// Route trigger as written in config. Exactly one form must be set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerConfig {
    /// Regex matched against inbound lines.
    #[serde(default, alias = "regex")]
    pub telnet_pattern: Option<String>,
    /// Inbound channel reference (gateway routes).
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Named non-text event, e.g. "serverup".
    #[serde(default)]
    pub custom: Option<String>,
    #[serde(default)]
    pub name_index: usize,
    #[serde(default)]
    pub message_index: usize,
    #[serde(default)]
    pub guild_index: usize,
}

impl Config {
    /// Reconnect sweep interval, floored at [`MIN_KEEP_ALIVE_RETRY`].
    pub fn keep_alive_retry(&self) -> Duration {
        parse_duration(&self.keep_alive_retry)
            .unwrap_or(MIN_KEEP_ALIVE_RETRY)
            .max(MIN_KEEP_ALIVE_RETRY)
    }

    /// Per-send timeout for the dispatch hub.
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
            .as_deref()
            .and_then(parse_duration)
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_SEND_TIMEOUT)
    }

    /// Whether the given transport is enabled in config.
    pub fn is_enabled(&self, id: TransportId) -> bool {
        match id {
            TransportId::Discord => self.discord.enabled,
            TransportId::Telnet => self.telnet.enabled,
            TransportId::EqLog => self.eqlog.enabled,
        }
    }

    /// Routes whose source is the given transport.
    pub fn routes_for(&self, source: TransportId) -> &[RouteConfig] {
        match source {
            TransportId::Discord => &self.discord.routes,
            TransportId::Telnet => &self.telnet.routes,
            TransportId::EqLog => &self.eqlog.routes,
        }
    }

    /// Replace symbolic channel names with IDs from `discord.channels`.
    ///
    /// Runs once after load. Names missing from the table are left as-is.
    pub fn resolve_channel_mappings(&mut self) {
        if self.discord.channels.is_empty() {
            return;
        }
        let table = self.discord.clone();

        let sources = [
            &mut self.telnet.routes,
            &mut self.eqlog.routes,
            &mut self.discord.routes,
        ];
        for routes in sources {
            for route in routes.iter_mut() {
                route.channel_id = table.resolve_channel_id(&route.channel_id);
                if let Some(ref mut guild) = route.guild_id {
                    *guild = table.resolve_channel_id(guild);
                }
                if let Some(ref mut channel) = route.trigger.channel_id {
                    *channel = table.resolve_channel_id(channel);
                }
            }
        }

        self.telnet.player_notifications.channel_id =
            table.resolve_channel_id(&self.telnet.player_notifications.channel_id);
        self.raid.discord_channel_id = table.resolve_channel_id(&self.raid.discord_channel_id);
    }
}

/// Parse a short duration string: "500ms", "10s", "2m", "1h" or bare seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (value, unit) = s.split_at(split);
    let value: u64 = value.parse().ok()?;
    match unit.trim() {
        "ms" => Some(Duration::from_millis(value)),
        "" | "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}

fn default_true() -> bool {
    true
}

fn default_keep_alive_retry() -> String {
    "10s".to_string()
}

fn default_bot_status() -> String {
    "EQ: {{.PlayerCount}} Online".to_string()
}
