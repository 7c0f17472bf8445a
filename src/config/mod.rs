//! Configuration parsing and types.

pub mod env;
pub mod parser;
pub mod types;
pub mod validate;

use std::path::Path;

use crate::common::error::ConfigError;

pub use env::get_config_path;
pub use types::*;

/// Load, override, resolve and validate the configuration in one step.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let config = parser::load_config(path)?;
    let mut config = env::apply_env_overrides(config);
    config.resolve_channel_mappings();
    validate::validate_config(&config)?;
    Ok(config)
}
