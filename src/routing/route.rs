//! Compiled routes.
//!
//! A [`CompiledRoute`] is a [`RouteConfig`] with its trigger regex and
//! message pattern compiled up front, so that a bad route aborts startup
//! instead of failing on the first matching line.

use fancy_regex::Regex;
use tracing::debug;

use crate::common::error::{ConfigError, RenderError};
use crate::common::{Event, TransportId};
use crate::config::types::{RouteConfig, TriggerConfig};
use crate::routing::template::{Template, TemplateContext};

/// The condition that fires a route.
#[derive(Debug)]
pub enum Trigger {
    /// Regex over the inbound message with capture indices for the fields.
    /// Index 0 means the field is not captured.
    Regex {
        pattern: Regex,
        name_group: usize,
        message_group: usize,
        guild_group: usize,
    },
    /// Inbound channel reference equality (gateway messages).
    Channel(String),
    /// A named non-text event such as "serverup".
    Custom(String),
}

impl Trigger {
    fn compile(config: &TriggerConfig) -> Result<Self, ConfigError> {
        let pattern = non_empty(&config.telnet_pattern);
        let channel = non_empty(&config.channel_id);
        let custom = non_empty(&config.custom);

        match (pattern, channel, custom) {
            (Some(pattern), None, None) => {
                let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;
                let groups = regex.captures_len();
                for (field, index) in [
                    ("name_index", config.name_index),
                    ("message_index", config.message_index),
                    ("guild_index", config.guild_index),
                ] {
                    if index >= groups {
                        return Err(ConfigError::ValidationError {
                            message: format!(
                                "trigger {} {} exceeds the {} capture group(s) of '{}'",
                                field,
                                index,
                                groups - 1,
                                pattern
                            ),
                        });
                    }
                }
                Ok(Trigger::Regex {
                    pattern: regex,
                    name_group: config.name_index,
                    message_group: config.message_index,
                    guild_group: config.guild_index,
                })
            }
            (None, Some(channel), None) => Ok(Trigger::Channel(channel.to_string())),
            (None, None, Some(custom)) => Ok(Trigger::Custom(custom.to_string())),
            (None, None, None) => Err(ConfigError::MissingField {
                field: "trigger".to_string(),
            }),
            _ => Err(ConfigError::ValidationError {
                message: "trigger must set exactly one of telnet_pattern, channel_id or custom"
                    .to_string(),
            }),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Values a trigger extracted from an inbound event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    pub name: String,
    pub message: String,
    pub guild_id: String,
}

/// A route ready for dispatch.
#[derive(Debug)]
pub struct CompiledRoute {
    pub trigger: Trigger,
    pub target: TransportId,
    /// Destination channel reference.
    pub channel_ref: String,
    /// Destination guild reference, if any.
    pub guild_ref: Option<String>,
    template: Template,
}

impl CompiledRoute {
    /// Compile a configured route.
    pub fn compile(config: &RouteConfig) -> Result<Self, ConfigError> {
        let target = TransportId::parse(&config.target).ok_or_else(|| {
            ConfigError::ValidationError {
                message: format!("unknown route target '{}'", config.target),
            }
        })?;
        let trigger = Trigger::compile(&config.trigger)?;
        let template = Template::parse(&config.message_pattern)?;

        Ok(Self {
            trigger,
            target,
            channel_ref: config.channel_id.clone(),
            guild_ref: config.guild_id.clone().filter(|g| !g.is_empty()),
            template,
        })
    }

    /// Match a raw line against a regex trigger.
    pub fn match_line(&self, line: &str) -> Option<RouteMatch> {
        let Trigger::Regex {
            pattern,
            name_group,
            message_group,
            guild_group,
        } = &self.trigger
        else {
            return None;
        };

        let caps = match pattern.captures(line) {
            Ok(Some(caps)) => caps,
            Ok(None) => return None,
            Err(e) => {
                debug!("Trigger regex failed on line: {}", e);
                return None;
            }
        };
        let group = |index: usize| -> String {
            if index == 0 {
                return String::new();
            }
            caps.get(index)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        Some(RouteMatch {
            name: group(*name_group),
            message: group(*message_group),
            guild_id: group(*guild_group),
        })
    }

    /// Match an inbound event.
    ///
    /// Regex triggers look at the message text; channel triggers compare the
    /// event's channel reference and take the author and message verbatim.
    /// Custom triggers never match text events.
    pub fn match_event(&self, event: &Event) -> Option<RouteMatch> {
        match &self.trigger {
            Trigger::Regex { .. } => self.match_line(&event.message),
            Trigger::Channel(channel) if *channel == event.channel_ref => Some(RouteMatch {
                name: event.author.clone(),
                message: event.message.clone(),
                guild_id: event.extra.clone(),
            }),
            Trigger::Channel(_) | Trigger::Custom(_) => None,
        }
    }

    /// Whether this route fires on the named custom event.
    pub fn matches_custom(&self, name: &str) -> bool {
        matches!(&self.trigger, Trigger::Custom(custom) if custom == name)
    }

    /// Render the message pattern for a match.
    pub fn render(&self, source: TransportId, matched: &RouteMatch) -> Result<String, RenderError> {
        let ctx = TemplateContext::new(matched.name.as_str(), matched.message.as_str())
            .with_channel(self.channel_ref.as_str())
            .with_guild(self.guild_for(matched))
            .with_source(source.as_str());
        self.template.render(&ctx)
    }

    /// Build the outbound event for a match.
    pub fn derive_event(&self, source: TransportId, matched: &RouteMatch) -> Result<Event, RenderError> {
        let message = self.render(source, matched)?;
        Ok(
            Event::new(source, matched.name.as_str(), self.channel_ref.as_str(), message)
                .with_extra(self.guild_for(matched)),
        )
    }

    fn guild_for(&self, matched: &RouteMatch) -> String {
        if matched.guild_id.is_empty() {
            self.guild_ref.clone().unwrap_or_default()
        } else {
            matched.guild_id.clone()
        }
    }
}

/// Compile every enabled route in a list. Disabled routes are skipped.
pub fn compile_routes(configs: &[RouteConfig]) -> Result<Vec<CompiledRoute>, ConfigError> {
    configs
        .iter()
        .filter(|r| r.enabled)
        .map(CompiledRoute::compile)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::TemplateError;

    fn ooc_route() -> RouteConfig {
        RouteConfig {
            enabled: true,
            trigger: TriggerConfig {
                telnet_pattern: Some(r"(\w+) says ooc, '(.*)'".to_string()),
                name_index: 1,
                message_index: 2,
                ..Default::default()
            },
            target: "discord".to_string(),
            channel_id: "111".to_string(),
            guild_id: None,
            message_pattern: "{{.Name}} **OOC**: {{.Message}}".to_string(),
        }
    }

    #[test]
    fn test_ooc_route_matches_and_renders() {
        let route = CompiledRoute::compile(&ooc_route()).unwrap();
        let matched = route.match_line("Alice says ooc, 'hi'").unwrap();
        assert_eq!(matched.name, "Alice");
        assert_eq!(matched.message, "hi");

        let event = route.derive_event(TransportId::Telnet, &matched).unwrap();
        assert_eq!(event.message, "Alice **OOC**: hi");
        assert_eq!(event.channel_ref, "111");
        assert_eq!(event.author, "Alice");
        assert_eq!(event.source, TransportId::Telnet);
    }

    #[test]
    fn test_non_matching_line() {
        let route = CompiledRoute::compile(&ooc_route()).unwrap();
        assert!(route.match_line("Alice shouts, 'hi'").is_none());
    }

    #[test]
    fn test_invalid_regex_fails_compile() {
        let mut config = ooc_route();
        config.trigger.telnet_pattern = Some("(unclosed".to_string());
        assert!(matches!(
            CompiledRoute::compile(&config),
            Err(ConfigError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_bad_template_fails_compile() {
        let mut config = ooc_route();
        config.message_pattern = "{{.Name".to_string();
        assert!(matches!(
            CompiledRoute::compile(&config),
            Err(ConfigError::InvalidTemplate(TemplateError::Unclosed { .. }))
        ));
    }

    #[test]
    fn test_capture_index_out_of_range() {
        let mut config = ooc_route();
        config.trigger.message_index = 3;
        assert!(matches!(
            CompiledRoute::compile(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_unknown_target_fails_compile() {
        let mut config = ooc_route();
        config.target = "nats".to_string();
        let err = CompiledRoute::compile(&config).unwrap_err();
        assert!(err.to_string().contains("nats"));
    }

    #[test]
    fn test_trigger_requires_exactly_one_form() {
        let mut config = ooc_route();
        config.trigger.custom = Some("serverup".to_string());
        assert!(CompiledRoute::compile(&config).is_err());

        config.trigger = TriggerConfig::default();
        assert!(matches!(
            CompiledRoute::compile(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_custom_trigger() {
        let mut config = ooc_route();
        config.trigger = TriggerConfig {
            custom: Some("serverup".to_string()),
            ..Default::default()
        };
        config.message_pattern = "**Admin ooc:** Server is now UP".to_string();
        let route = CompiledRoute::compile(&config).unwrap();

        assert!(route.matches_custom("serverup"));
        assert!(!route.matches_custom("serverdown"));
        assert!(route
            .match_event(&Event::line(TransportId::Telnet, "serverup"))
            .is_none());
    }

    #[test]
    fn test_channel_trigger_matches_event() {
        let config = RouteConfig {
            enabled: true,
            trigger: TriggerConfig {
                channel_id: Some("111".to_string()),
                ..Default::default()
            },
            target: "telnet".to_string(),
            channel_id: "260".to_string(),
            guild_id: None,
            message_pattern: "emote world {{.ChannelID}} {{.Name}} says from discord, '{{.Message}}'"
                .to_string(),
        };
        let route = CompiledRoute::compile(&config).unwrap();

        let inbound = Event::new(TransportId::Discord, "Bob", "111", "hello");
        let matched = route.match_event(&inbound).unwrap();
        let event = route.derive_event(TransportId::Discord, &matched).unwrap();
        assert_eq!(event.message, "emote world 260 Bob says from discord, 'hello'");
        assert_eq!(route.target, TransportId::Telnet);

        let elsewhere = Event::new(TransportId::Discord, "Bob", "222", "hello");
        assert!(route.match_event(&elsewhere).is_none());
    }

    #[test]
    fn test_guild_from_route_when_not_captured() {
        let mut config = ooc_route();
        config.guild_id = Some("42".to_string());
        let route = CompiledRoute::compile(&config).unwrap();
        let matched = route.match_line("Alice says ooc, 'hi'").unwrap();
        let event = route.derive_event(TransportId::Telnet, &matched).unwrap();
        assert_eq!(event.extra, "42");
    }

    #[test]
    fn test_compile_routes_skips_disabled() {
        let mut disabled = ooc_route();
        disabled.enabled = false;
        disabled.trigger.telnet_pattern = Some("(broken".to_string());
        let routes = compile_routes(&[ooc_route(), disabled]).unwrap();
        assert_eq!(routes.len(), 1);
    }
}
