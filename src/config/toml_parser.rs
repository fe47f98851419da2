//! TOML configuration file handling
//!
//! Reads and writes the settings file. Missing sections and keys fall back to
//! their defaults, so an empty file is a valid configuration.

use crate::config::Config;
use crate::error::{ControlError, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// Load configuration from a TOML file
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        ControlError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;

    let config = toml::from_str(&contents)
        .map_err(|e| ControlError::Config(format!("Failed to parse TOML config: {}", e)))?;

    info!("Settings loaded from {:?}", path);
    Ok(config)
}

/// Parse configuration from a TOML string
pub fn parse(toml: &str) -> Result<Config> {
    toml::from_str(toml).map_err(|e| ControlError::Config(format!("Failed to parse TOML: {}", e)))
}

/// Write configuration to a TOML file, creating parent directories
pub fn write_file<P: AsRef<Path>>(config: &Config, path: P) -> Result<()> {
    let path = path.as_ref();
    let contents = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                ControlError::Config(format!("Failed to create config directory {:?}: {}", parent, e))
            })?;
        }
    }

    fs::write(path, contents).map_err(|e| {
        ControlError::Config(format!("Failed to write config file {:?}: {}", path, e))
    })?;

    info!("Settings saved to {:?}", path);
    Ok(())
}
