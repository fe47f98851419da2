//! Configuration validation functions
//!
//! Range checks for every settings value, shared by config loading and by
//! the runtime setters on the controller.

use crate::error::{ControlError, Result};
use std::net::IpAddr;

/// Validate a configured port (1024-65535)
pub fn validate_port(port: u16) -> Result<()> {
    if port < 1024 {
        return Err(ControlError::Validation(format!(
            "Port {} is out of valid range (1024-65535)",
            port
        )));
    }
    Ok(())
}

/// Validate log level (0-7)
pub fn validate_log_level(level: u8) -> Result<()> {
    if level > 7 {
        return Err(ControlError::Validation(format!(
            "Log level {} is out of valid range (0-7)",
            level
        )));
    }
    Ok(())
}

/// Validate audit log capacity (10-1000)
pub fn validate_max_log_entries(entries: usize) -> Result<()> {
    if !(10..=1000).contains(&entries) {
        return Err(ControlError::Validation(format!(
            "Max log entries {} is out of valid range (10-1000)",
            entries
        )));
    }
    Ok(())
}

/// Validate bind address (IP literal)
pub fn validate_bind_address(address: &str) -> Result<()> {
    address
        .parse::<IpAddr>()
        .map_err(|_| ControlError::Validation(format!("Invalid bind address: {}", address)))?;
    Ok(())
}

/// Validate a route path (absolute, no whitespace, no query)
pub fn validate_route_path(path: &str) -> Result<()> {
    if !path.starts_with('/') || path.len() < 2 {
        return Err(ControlError::Validation(format!(
            "Route path '{}' must start with '/' and name a resource",
            path
        )));
    }

    if path.chars().any(|c| c.is_whitespace() || c == '?' || c == '#') {
        return Err(ControlError::Validation(format!(
            "Route path '{}' contains invalid characters",
            path
        )));
    }

    Ok(())
}

/// Validate the graceful shutdown bound (1-60000 ms)
pub fn validate_shutdown_timeout(ms: u64) -> Result<()> {
    if !(1..=60_000).contains(&ms) {
        return Err(ControlError::Validation(format!(
            "Shutdown timeout {}ms is out of valid range (1-60000)",
            ms
        )));
    }
    Ok(())
}
