//! Control API request and response types
//!
//! This module defines the JSON bodies exchanged over the command and status
//! routes. Every body is sent with HTTP 200; logical failure travels in the
//! `success` field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Request field naming the target of an action
pub const TARGET_FIELD: &str = "blueprint_path";

/// Request field naming the action type
pub const ACTION_FIELD: &str = "node_type";

/// Protocol version reported by the status route
pub const PROTOCOL_VERSION: &str = "1.0";

/// Parsed command: an action type plus string parameters.
///
/// The target identifier is carried in `params` under [`TARGET_FIELD`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Action type, e.g. `PrintString`
    pub action: String,
    /// Action parameters; opaque to the server apart from the target
    pub params: HashMap<String, String>,
}

impl CommandRequest {
    /// Create a request for `action` on `target`
    pub fn new(action: impl Into<String>, target: impl Into<String>) -> Self {
        let mut params = HashMap::new();
        params.insert(TARGET_FIELD.to_string(), target.into());
        Self {
            action: action.into(),
            params,
        }
    }

    /// Parse a raw request body
    pub fn from_body(body: &[u8]) -> Result<Self, ProtocolError> {
        Self::from_fields(&parse_body(body)?)
    }

    /// Build a request from a parsed JSON object.
    ///
    /// Both required fields must be strings. Other string fields are kept as
    /// parameters; non-string extras are dropped.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self, ProtocolError> {
        let required = |name: &'static str| {
            fields
                .get(name)
                .and_then(Value::as_str)
                .ok_or(ProtocolError::MissingField(name))
        };

        let target = required(TARGET_FIELD)?;
        let action = required(ACTION_FIELD)?.to_string();

        let mut params: HashMap<String, String> = fields
            .iter()
            .filter(|(key, _)| key.as_str() != ACTION_FIELD)
            .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
            .collect();
        params.insert(TARGET_FIELD.to_string(), target.to_string());

        Ok(Self { action, params })
    }

    /// Target identifier
    pub fn target(&self) -> &str {
        self.params.get(TARGET_FIELD).map(String::as_str).unwrap_or_default()
    }

    /// Wire body for this request
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        for (key, value) in &self.params {
            body.insert(key.clone(), Value::String(value.clone()));
        }
        body.insert(ACTION_FIELD.to_string(), Value::String(self.action.clone()));
        Value::Object(body)
    }

    /// The two protocol fields, echoed back in the response
    pub fn echo(&self) -> BTreeMap<String, String> {
        let mut echo = BTreeMap::new();
        echo.insert(TARGET_FIELD.to_string(), self.target().to_string());
        echo.insert(ACTION_FIELD.to_string(), self.action.clone());
        echo
    }
}

/// Parse a body as a UTF-8 JSON object
pub fn parse_body(body: &[u8]) -> Result<Map<String, Value>, ProtocolError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        _ => Err(ProtocolError::InvalidJson),
    }
}

/// Whichever protocol fields were present as strings
pub fn echo_fields(fields: &Map<String, Value>) -> BTreeMap<String, String> {
    [TARGET_FIELD, ACTION_FIELD]
        .into_iter()
        .filter_map(|name| {
            fields
                .get(name)
                .and_then(Value::as_str)
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect()
}

/// Response to a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Whether the action succeeded
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// Request fields echoed back
    #[serde(flatten)]
    pub echo: BTreeMap<String, String>,
}

impl CommandResponse {
    /// Successful response
    pub fn success(message: impl Into<String>, echo: BTreeMap<String, String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            echo,
        }
    }

    /// Failed response
    pub fn failure(message: impl Into<String>, echo: BTreeMap<String, String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            echo,
        }
    }

    /// Echoed field by name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.echo.get(name).map(String::as_str)
    }
}

impl From<ProtocolError> for CommandResponse {
    fn from(err: ProtocolError) -> Self {
        CommandResponse::failure(err.to_string(), BTreeMap::new())
    }
}

/// Response of the status route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    /// Always true in-band; an unreachable server is the "not running" signal
    pub server_running: bool,
    /// Bound port
    pub port: u16,
    /// Human-readable status line
    pub status: String,
    /// Protocol version
    pub version: String,
}

impl StatusReply {
    /// Status of a server bound to `port`
    pub fn running(port: u16) -> Self {
        Self {
            server_running: true,
            port,
            status: format!("Control server is running on port {}", port),
            version: PROTOCOL_VERSION.to_string(),
        }
    }
}

/// Malformed command bodies. Reported in-band, never as an HTTP error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Body is not a UTF-8 JSON object
    #[error("Invalid JSON in request body")]
    InvalidJson,

    /// Required string field absent or of the wrong type
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
}
