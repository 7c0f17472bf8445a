//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.
//! All problems are collected before failing so that one startup attempt
//! reports everything that needs fixing.

use tracing::warn;

use crate::common::error::ConfigError;
use crate::common::TransportId;
use crate::config::types::{parse_duration, Config};
use crate::parsers::compile_start_markers;
use crate::routing::{CompiledRoute, Template};

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if parse_duration(&config.keep_alive_retry).is_none() {
        warn!(
            "keep_alive_retry '{}' is not a valid duration, using {}s",
            config.keep_alive_retry,
            config.keep_alive_retry().as_secs()
        );
    }
    if let Some(ref timeout) = config.send_timeout {
        if parse_duration(timeout).is_none() {
            errors.push(format!("send_timeout '{}' is not a valid duration", timeout));
        }
    }

    if config.discord.enabled {
        if config.discord.token.is_empty() {
            errors.push("discord.token is required".to_string());
        }
        if config.discord.token == "YOUR_DISCORD_TOKEN_HERE" {
            errors.push("discord.token has not been configured (still using placeholder)".to_string());
        }
        if let Err(e) = Template::parse(&config.discord.bot_status) {
            errors.push(format!("discord.bot_status: {}", e));
        }
    }

    if config.telnet.enabled && config.telnet.host.is_empty() {
        errors.push("telnet.host is required".to_string());
    }
    if config.telnet.player_notifications.enabled
        && config.telnet.player_notifications.channel_id.is_empty()
    {
        errors.push("telnet.player_notifications.channel_id is required".to_string());
    }

    if config.eqlog.enabled {
        if config.eqlog.path.is_empty() {
            errors.push("eqlog.path is required".to_string());
        }
        if let Some(ref interval) = config.eqlog.poll_interval {
            if parse_duration(interval).is_none() {
                errors.push(format!(
                    "eqlog.poll_interval '{}' is not a valid duration",
                    interval
                ));
            }
        }
    }

    if config.raid.enabled && config.raid.auto_post {
        for (field, value) in [
            ("raid.api_url", &config.raid.api_url),
            ("raid.api_token", &config.raid.api_token),
            ("raid.raid_event_id", &config.raid.raid_event_id),
        ] {
            if value.is_empty() {
                errors.push(format!("{} is required when raid.auto_post is set", field));
            }
        }
    }
    if config.raid.enabled {
        if let Err(e) = compile_start_markers(config.raid.start_markers.as_deref()) {
            errors.push(format!("raid.start_markers: {}", e));
        }
    }

    for source in TransportId::ALL {
        for (i, route) in config.routes_for(source).iter().enumerate() {
            if !route.enabled {
                continue;
            }
            if let Err(e) = CompiledRoute::compile(route) {
                errors.push(format!("{}.routes[{}]: {}", source, i, e));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::types::*;

    fn make_valid_config() -> Config {
        let route = RouteConfig {
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
        };
        Config {
            debug: false,
            keep_alive: true,
            keep_alive_retry: "10s".to_string(),
            send_timeout: None,
            discord: DiscordConfig {
                enabled: true,
                token: "valid_token_here".to_string(),
                ..Default::default()
            },
            telnet: TelnetConfig {
                enabled: true,
                host: "127.0.0.1:9000".to_string(),
                routes: vec![route],
                ..Default::default()
            },
            eqlog: EqLogConfig::default(),
            raid: RaidConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let config = make_valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_token_fails() {
        let mut config = make_valid_config();
        config.discord.token = String::new();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("discord.token"));
    }

    #[test]
    fn test_disabled_transport_not_checked() {
        let mut config = make_valid_config();
        config.discord.enabled = false;
        config.discord.token = String::new();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_placeholder_token_fails() {
        let mut config = make_valid_config();
        config.discord.token = "YOUR_DISCORD_TOKEN_HERE".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("placeholder"));
    }

    #[test]
    fn test_invalid_route_regex_fails() {
        let mut config = make_valid_config();
        config.telnet.routes[0].trigger.telnet_pattern = Some("[invalid".to_string());

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("telnet.routes[0]"));
        assert!(message.contains("[invalid"));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = make_valid_config();
        config.discord.token = String::new();
        config.telnet.host = String::new();
        config.telnet.routes[0].target = "nowhere".to_string();

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("discord.token"));
        assert!(message.contains("telnet.host"));
        assert!(message.contains("nowhere"));
    }

    #[test]
    fn test_raid_auto_post_requires_api() {
        let mut config = make_valid_config();
        config.raid.enabled = true;
        config.raid.auto_post = true;
        config.raid.api_url = "https://raids.example".to_string();

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("raid.api_token"));
        assert!(message.contains("raid.raid_event_id"));
        assert!(!message.contains("raid.api_url"));
    }

    #[test]
    fn test_bad_keep_alive_retry_falls_back() {
        let mut config = make_valid_config();
        config.keep_alive_retry = "5 seconds".to_string();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.keep_alive_retry(), Duration::from_secs(10));
    }

    #[test]
    fn test_bad_send_timeout_fails() {
        let mut config = make_valid_config();
        config.send_timeout = Some("often".to_string());
        assert!(validate_config(&config)
            .unwrap_err()
            .to_string()
            .contains("send_timeout"));
    }

    #[test]
    fn test_bad_raid_start_marker_fails() {
        let mut config = make_valid_config();
        config.raid.enabled = true;
        config.raid.start_markers = Some(vec!["(unclosed".to_string()]);

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("raid.start_markers"));
    }

    #[test]
    fn test_bad_bot_status_fails() {
        let mut config = make_valid_config();
        config.discord.bot_status = "EQ: {{.PlayerCount".to_string();

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("discord.bot_status"));
    }
}
