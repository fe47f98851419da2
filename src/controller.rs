//! Top-level controller
//!
//! [`Controller`] is what a front-end (GUI panel, CLI, host application)
//! talks to. It owns the audit log and the control server, applies the
//! configuration it was built with, and exposes start/stop/query operations
//! plus the request log.

use crate::config::{validate_max_log_entries, Config};
use crate::control::{CommandExecutor, ControlServer, StatusChange};
use crate::error::{Result, StartError};
use crate::monitoring::{AuditLog, RequestLogEntry, RequestStats};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Owns the server and its audit log
pub struct Controller {
    config: Config,
    audit: Arc<AuditLog>,
    server: ControlServer,
}

impl Controller {
    /// Create a controller with the server stopped
    pub fn new(config: Config, executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        config.validate()?;

        let audit = Arc::new(AuditLog::new(config.ui.max_log_entries));
        let server = ControlServer::new(&config.server, executor, audit.clone())?;
        server
            .dispatcher()
            .set_request_logging(config.ui.show_request_logs);

        Ok(Self {
            config,
            audit,
            server,
        })
    }

    /// Apply start-up settings: starts the server when auto-start is on
    pub async fn initialize(&self) -> std::result::Result<(), StartError> {
        if !self.config.server.auto_start {
            info!("Auto-start disabled; server will start on request");
            return Ok(());
        }

        info!("Auto-starting control server");
        self.start_server(None).await
    }

    /// Stop the server before the host shuts down
    pub async fn shutdown(&self) {
        self.server.stop().await;
        info!("Controller shut down");
    }

    /// Start the server on `port`, or the configured default port
    pub async fn start_server(&self, port: Option<u16>) -> std::result::Result<(), StartError> {
        let port = port.unwrap_or(self.config.server.default_port);
        info!("Start requested on port {}", port);

        match self.server.start(port).await {
            Ok(()) => {
                info!("Control server started on port {}", self.server.port());
                Ok(())
            }
            Err(e) => {
                error!("Failed to start control server on port {}: {}", port, e);
                Err(e)
            }
        }
    }

    /// Stop the server
    pub async fn stop_server(&self) {
        self.server.stop().await;
    }

    /// Restart on the current port, or the default port when stopped
    pub async fn restart_server(&self) -> std::result::Result<(), StartError> {
        self.server.restart(self.config.server.default_port).await
    }

    /// Check if the server is running
    pub fn is_server_running(&self) -> bool {
        self.server.is_running()
    }

    /// Bound port, 0 when stopped
    pub fn server_port(&self) -> u16 {
        self.server.port()
    }

    /// `"Stopped"` or `"Running on port N"`
    pub fn server_status(&self) -> String {
        self.server.state().to_string()
    }

    /// True iff the server is running. No network probe is made.
    pub fn test_connection(&self) -> bool {
        let running = self.server.is_running();
        if running {
            info!("Connection test: server is running on port {}", self.server.port());
        } else {
            info!("Cannot test connection: server is not running");
        }
        running
    }

    /// Time since the server started
    pub fn uptime(&self) -> Option<Duration> {
        self.server.uptime()
    }

    /// Subscribe to server status changes
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.server.subscribe()
    }

    /// Handled requests, oldest first
    pub fn request_logs(&self) -> Vec<RequestLogEntry> {
        self.audit.snapshot()
    }

    /// Empty the request log
    pub fn clear_request_logs(&self) {
        self.audit.clear();
        info!("Request logs cleared");
    }

    /// Totals over the request log
    pub fn request_stats(&self) -> RequestStats {
        self.audit.stats()
    }

    /// Change the request log capacity (10-1000)
    pub fn set_max_log_entries(&self, entries: usize) -> Result<()> {
        validate_max_log_entries(entries)?;
        self.audit.set_capacity(entries);
        Ok(())
    }

    /// Shared handle to the request log
    pub fn audit_log(&self) -> Arc<AuditLog> {
        self.audit.clone()
    }

    /// Configuration the controller was built with
    pub fn config(&self) -> &Config {
        &self.config
    }
}
