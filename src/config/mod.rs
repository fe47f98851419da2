//! Configuration management
//!
//! Settings are loaded from (and saved to) a TOML file and handed to the
//! [`Controller`](crate::controller::Controller) at construction. There is no
//! process-wide settings object.

mod toml_parser;
mod validation;

pub use validation::{
    validate_bind_address, validate_log_level, validate_max_log_entries, validate_port,
    validate_route_path, validate_shutdown_timeout,
};

use crate::error::{ControlError, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Path of the status route; fixed by the wire protocol
pub const STATUS_PATH: &str = "/status";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server behavior
    #[serde(default)]
    pub server: ServerConfig,

    /// Log verbosity
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Front-end preferences
    #[serde(default)]
    pub ui: UiConfig,
}

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Start the server when the controller initializes
    #[serde(default)]
    pub auto_start: bool,

    /// Port used when no explicit port is given
    #[serde(default = "default_port")]
    pub default_port: u16,

    /// Address the listener binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Path of the POST command route
    #[serde(default = "default_command_path")]
    pub command_path: String,

    /// Upper bound on the graceful drain when stopping
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 0=off, 1=fatal, 2=error, 3=warning, 4=display, 5=log, 6=verbose, 7=very verbose
    #[serde(default = "default_log_level")]
    pub level: u8,
}

/// `[ui]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Log each handled request at info level instead of debug
    #[serde(default = "default_true")]
    pub show_request_logs: bool,

    /// Audit log capacity
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,
}

impl Config {
    /// Create a configuration with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = toml_parser::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(toml: &str) -> Result<Self> {
        let config = toml_parser::parse(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.validate()?;
        toml_parser::write_file(self, path)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        validate_log_level(self.logging.level)?;
        validate_max_log_entries(self.ui.max_log_entries)?;
        Ok(())
    }
}

impl ServerConfig {
    /// Validate server settings
    pub fn validate(&self) -> Result<()> {
        validate_port(self.default_port)?;
        validate_bind_address(&self.bind_address)?;
        validate_route_path(&self.command_path)?;
        validate_shutdown_timeout(self.shutdown_timeout_ms)?;

        if self.command_path == STATUS_PATH {
            return Err(ControlError::Validation(format!(
                "Command path cannot be the status path '{}'",
                STATUS_PATH
            )));
        }

        Ok(())
    }

    /// Parsed bind address
    pub fn bind_ip(&self) -> Result<IpAddr> {
        self.bind_address
            .parse()
            .map_err(|_| ControlError::Config(format!("Invalid bind address: {}", self.bind_address)))
    }

    /// Drain bound as a duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl LoggingConfig {
    /// `tracing` filter directive for the configured level
    pub fn filter_directive(&self) -> &'static str {
        match self.level {
            0 => "off",
            1 | 2 => "error",
            3 => "warn",
            4 | 5 => "info",
            6 => "debug",
            _ => "trace",
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            auto_start: false,
            default_port: default_port(),
            bind_address: default_bind_address(),
            command_path: default_command_path(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_request_logs: true,
            max_log_entries: default_max_log_entries(),
        }
    }
}

// Default value functions for serde
fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_command_path() -> String {
    "/add_node".to_string()
}

fn default_shutdown_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> u8 {
    3
}

fn default_true() -> bool {
    true
}

fn default_max_log_entries() -> usize {
    100
}
