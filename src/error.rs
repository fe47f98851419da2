//! Error types for mcp-control
//!
//! This module defines the error types used throughout the crate.
//! We use `thiserror` for ergonomic error definitions and `anyhow` for
//! error propagation in the binary.

use thiserror::Error;

/// Main error type for mcp-control operations
#[derive(Error, Debug)]
pub enum ControlError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Settings value out of range or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTTP client errors (CLI talking to a running server)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server lifecycle errors
    #[error(transparent)]
    Start(#[from] StartError),
}

/// Result type alias using ControlError
pub type Result<T> = std::result::Result<T, ControlError>;

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        ControlError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ControlError {
    fn from(err: toml::de::Error) -> Self {
        ControlError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ControlError {
    fn from(err: toml::ser::Error) -> Self {
        ControlError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ControlError {
    fn from(err: reqwest::Error) -> Self {
        ControlError::Http(err.to_string())
    }
}

/// Failure to bring the control server up.
///
/// Every variant leaves the server `Stopped` with nothing bound.
#[derive(Error, Debug)]
pub enum StartError {
    /// Start was called while the server is already running
    #[error("Server is already running on port {port}")]
    AlreadyRunning {
        /// Port the running server is bound to
        port: u16,
    },

    /// Port outside the accepted range (0 or 1024-65535)
    #[error("Port {0} is not allowed (use 0 for an ephemeral port or 1024-65535)")]
    InvalidPort(u16),

    /// Listening socket could not be bound
    #[error("Failed to bind port {port}: {source}")]
    Bind {
        /// Requested port
        port: u16,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Routes could not be bound on the new listener
    #[error("Failed to bind routes: {0}")]
    RouteBind(String),
}

/// Failure reported by a command executor.
///
/// The display text is what clients see in the `message` field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Action type the executor does not implement
    #[error("Unsupported node type '{0}'")]
    Unsupported(String),

    /// Empty or malformed target identifier
    #[error("Invalid target '{0}'")]
    InvalidTarget(String),

    /// The action ran but its result could not be stored
    #[error("Persistence failed: {0}")]
    Persistence(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_error_messages() {
        let err = StartError::AlreadyRunning { port: 8080 };
        assert_eq!(err.to_string(), "Server is already running on port 8080");

        let err = StartError::InvalidPort(80);
        assert!(err.to_string().contains("80"));
    }

    #[test]
    fn test_start_error_converts() {
        let err: ControlError = StartError::RouteBind("no listener".to_string()).into();
        assert!(matches!(err, ControlError::Start(StartError::RouteBind(_))));
    }

    #[test]
    fn test_action_error_display() {
        let err = ActionError::Unsupported("Branch".to_string());
        assert_eq!(err.to_string(), "Unsupported node type 'Branch'");
    }
}
