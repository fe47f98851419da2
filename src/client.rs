//! HTTP client for a running control server
//!
//! Used by the CLI and by integration tests. A connection failure is the only
//! reliable "not running" signal; the status body always says running.

use crate::control::{CommandRequest, CommandResponse, StatusReply};
use crate::error::{ControlError, Result};
use std::time::Duration;
use tracing::debug;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the command and status routes
#[derive(Debug, Clone)]
pub struct ControlClient {
    base_url: String,
    command_path: String,
    http: reqwest::Client,
}

impl ControlClient {
    /// Client for a server at `host:port` using the default command path
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            base_url: format!("http://{}:{}", host, port),
            command_path: "/add_node".to_string(),
            http,
        })
    }

    /// Use a different command route path
    pub fn with_command_path(mut self, path: impl Into<String>) -> Self {
        self.command_path = path.into();
        self
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET the status route
    pub async fn status(&self) -> Result<StatusReply> {
        let url = format!("{}/status", self.base_url);
        debug!("GET {}", url);
        let reply = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| connect_error(&self.base_url, e))?
            .error_for_status()?
            .json()
            .await?;
        Ok(reply)
    }

    /// POST a command
    pub async fn send(&self, request: &CommandRequest) -> Result<CommandResponse> {
        let url = format!("{}{}", self.base_url, self.command_path);
        debug!("POST {} {:?}", url, request);
        let reply = self
            .http
            .post(&url)
            .json(&request.to_json())
            .send()
            .await
            .map_err(|e| connect_error(&self.base_url, e))?
            .error_for_status()?
            .json()
            .await?;
        Ok(reply)
    }

    /// True when the status route answers
    pub async fn is_reachable(&self) -> bool {
        self.status().await.is_ok()
    }
}

fn connect_error(base_url: &str, err: reqwest::Error) -> ControlError {
    if err.is_connect() {
        ControlError::Http(format!("Server is not running at {}", base_url))
    } else {
        err.into()
    }
}
