//! Configuration file parsing (HOCON format).

use std::path::Path;

use hocon::HoconLoader;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Load configuration from a HOCON file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    HoconLoader::new()
        .load_file(path)
        .map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Load configuration from a HOCON string.
#[cfg(test)]
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    HoconLoader::new()
        .load_str(content)
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TransportId;

    const SAMPLE: &str = r#"
        keep_alive = true
        keep_alive_retry = "30s"
        discord {
            enabled = true
            token = "abc"
            server_id = "42"
            channels { ooc = "111" }
            routes = [
                {
                    enabled = true
                    trigger { channel_id = "ooc" }
                    target = "telnet"
                    channel_id = "260"
                    message_pattern = "emote world {{.ChannelID}} {{.Name}} says from discord, '{{.Message}}'"
                }
            ]
        }
        telnet {
            enabled = true
            host = "127.0.0.1:9000"
            routes = [
                {
                    enabled = true
                    trigger { telnet_pattern = "(\\w+) says ooc, '(.*)'", name_index = 1, message_index = 2 }
                    target = "discord"
                    channel_id = "ooc"
                    message_pattern = "{{.Name}} **OOC**: {{.Message}}"
                }
            ]
        }
    "#;

    #[test]
    fn test_load_config_str() {
        let config = load_config_str(SAMPLE).unwrap();
        assert!(config.keep_alive);
        assert!(config.is_enabled(TransportId::Discord));
        assert!(config.is_enabled(TransportId::Telnet));
        assert!(!config.is_enabled(TransportId::EqLog));
        assert_eq!(config.discord.channels.get("ooc").map(String::as_str), Some("111"));
        assert_eq!(config.telnet.routes.len(), 1);
        assert_eq!(config.telnet.routes[0].trigger.name_index, 1);
        assert_eq!(
            config.telnet.routes[0].trigger.telnet_pattern.as_deref(),
            Some(r"(\w+) says ooc, '(.*)'")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/talkbridge.conf");
        assert!(result.is_err());
    }
}
