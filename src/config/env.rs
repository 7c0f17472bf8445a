//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `TALKBRIDGE_CONFIG` - Config file path
//! - `TALKBRIDGE_DISCORD_TOKEN` - Discord bot token
//! - `TALKBRIDGE_TELNET_HOST` - Console host:port
//! - `TALKBRIDGE_RAID_API_TOKEN` - Raid manager API token

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "TALKBRIDGE";

/// Apply environment variable overrides to a config.
///
/// This allows secrets to be provided via the environment instead of
/// the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(token) = env::var(format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
        config.discord.token = token;
    }
    if let Ok(host) = env::var(format!("{}_TELNET_HOST", ENV_PREFIX)) {
        config.telnet.host = host;
    }
    if let Ok(token) = env::var(format!("{}_RAID_API_TOKEN", ENV_PREFIX)) {
        config.raid.api_token = token;
    }
    config
}

/// Get the config file path from environment or use default.
///
/// Checks `TALKBRIDGE_CONFIG` environment variable, otherwise returns "talkbridge.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "talkbridge.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::load_config_str;

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "TALKBRIDGE");
    }

    #[test]
    fn test_apply_env_overrides() {
        env::set_var("TALKBRIDGE_RAID_API_TOKEN", "from-env");
        let config = load_config_str("raid { api_token = \"from-file\" }").unwrap();
        let result = apply_env_overrides(config);
        env::remove_var("TALKBRIDGE_RAID_API_TOKEN");

        assert_eq!(result.raid.api_token, "from-env");
    }
}
