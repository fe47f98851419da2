//! Command executors
//!
//! The server parses requests and reports results; what a command actually
//! does is up to a [`CommandExecutor`]. [`AssetExecutor`] is the reference
//! implementation: it creates a named asset holding one `PrintString` node.

use crate::control::api::TARGET_FIELD;
use crate::error::ActionError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// The only action type [`AssetExecutor`] implements
pub const PRINT_STRING: &str = "PrintString";

/// Performs the domain action behind the command route.
///
/// Calls are synchronous and may block; the server runs them on the blocking
/// pool and imposes no timeout. Repeating a call is not assumed idempotent.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor: Send + Sync {
    /// Run `action` with `params`, returning a success message
    fn execute(&self, action: &str, params: &HashMap<String, String>) -> Result<String, ActionError>;
}

/// Node placed in an asset's graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node type
    pub kind: String,
    /// Graph X position
    pub x: i32,
    /// Graph Y position
    pub y: i32,
}

/// Asset produced by [`AssetExecutor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Full asset path, e.g. `/Game/MyAsset`
    pub path: String,
    /// Last path segment
    pub name: String,
    /// Graph contents
    pub nodes: Vec<GraphNode>,
}

/// Creates assets containing a single `PrintString` node.
///
/// With a root directory each asset is written to `<root>/<path>.json`;
/// otherwise assets live only in memory. Existing assets are overwritten.
pub struct AssetExecutor {
    root: Option<PathBuf>,
    assets: Mutex<HashMap<String, Asset>>,
}

impl AssetExecutor {
    /// Executor that keeps assets in memory
    pub fn in_memory() -> Self {
        Self {
            root: None,
            assets: Mutex::new(HashMap::new()),
        }
    }

    /// Executor that persists assets under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            assets: Mutex::new(HashMap::new()),
        }
    }

    /// Asset previously created at `path`
    pub fn asset(&self, path: &str) -> Option<Asset> {
        self.assets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Number of assets created so far
    pub fn asset_count(&self) -> usize {
        self.assets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// File backing `path` when persisting to disk
    pub fn asset_file(&self, path: &str) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(format!("{}.json", path.trim_start_matches('/'))))
    }

    fn persist(&self, asset: &Asset) -> Result<(), ActionError> {
        let Some(file) = self.asset_file(&asset.path) else {
            return Ok(());
        };

        if file.exists() {
            warn!("Overwriting existing asset at {:?}", file);
        }

        write_asset(&file, asset).map_err(|e| {
            error!("Failed to save asset {}: {}", asset.path, e);
            ActionError::Persistence(format!("could not save '{}': {}", asset.path, e))
        })
    }
}

impl CommandExecutor for AssetExecutor {
    fn execute(&self, action: &str, params: &HashMap<String, String>) -> Result<String, ActionError> {
        debug!("Executing {} with {:?}", action, params);

        if action != PRINT_STRING {
            warn!(
                "Unsupported node type: {}. Only '{}' is currently supported.",
                action, PRINT_STRING
            );
            return Err(ActionError::Unsupported(action.to_string()));
        }

        let target = params.get(TARGET_FIELD).map(String::as_str).unwrap_or_default();
        let name = asset_name(target)?;

        let asset = Asset {
            path: target.to_string(),
            name: name.to_string(),
            nodes: vec![GraphNode {
                kind: action.to_string(),
                x: 200,
                y: 200,
            }],
        };

        self.persist(&asset)?;
        self.assets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(asset.path.clone(), asset);

        info!("Created asset with {} node at {}", action, target);
        Ok(format!("Asset created with {} node at '{}'", action, target))
    }
}

/// Validate a target path and return its asset name.
///
/// The path must be absolute, have a package part before the final segment,
/// and contain no empty, `.` or `..` segments.
fn asset_name(target: &str) -> Result<&str, ActionError> {
    let invalid = || ActionError::InvalidTarget(target.to_string());

    let relative = target.strip_prefix('/').ok_or_else(invalid)?;
    if relative.contains('\\') {
        return Err(invalid());
    }

    let segments: Vec<&str> = relative.split('/').collect();
    if segments.len() < 2 || segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
        return Err(invalid());
    }

    segments.last().copied().ok_or_else(invalid)
}

fn write_asset(file: &Path, asset: &Asset) -> std::io::Result<()> {
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_vec_pretty(asset)?;
    fs::write(file, contents)
}
