//! mcp-control: embeddable control-plane HTTP server
//!
//! This library provides a small remote-control surface over a single HTTP
//! port: a command route that hands parsed requests to a pluggable executor,
//! a status route, and a bounded audit log of every request handled.
//!
//! # Architecture
//!
//! A host application builds a [`Controller`](controller::Controller) from a
//! [`Config`](config::Config) and a [`CommandExecutor`](control::CommandExecutor).
//! The controller owns the audit log and the lifecycle-managed server; a
//! front-end drives it through start/stop/restart calls and either polls the
//! query methods or subscribes to status change events.
//!
//! # Modules
//!
//! - `config`: Configuration parsing, persistence and validation
//! - `control`: HTTP server lifecycle, routes, wire types and executors
//! - `controller`: Public control API over server and audit log
//! - `monitoring`: Request audit log and statistics
//! - `client`: HTTP client for a running server
//! - `error`: Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod control;
pub mod controller;
pub mod error;
pub mod monitoring;

// Re-export commonly used types
pub use error::{ControlError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
