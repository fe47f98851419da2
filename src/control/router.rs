//! Route table for one listener
//!
//! An [`HttpRouter`] is created per listening socket and maps
//! (method, path) pairs to handlers. Each binding is identified by an opaque
//! [`RouteHandle`] used to remove it again.

use axum::http::Method;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Handler a route dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteHandler {
    /// Parse a command and run it through the executor
    Command,
    /// Report server status
    Status,
}

/// Method and path of a route
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    /// HTTP method
    pub method: Method,
    /// Exact request path
    pub path: String,
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Token returned by [`HttpRouter::bind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteHandle(u64);

/// Route binding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// The (method, path) pair already has a handler
    #[error("Route {0} is already bound")]
    AlreadyBound(RouteKey),
}

struct Binding {
    handle: RouteHandle,
    handler: RouteHandler,
}

/// Route table of a single listener
pub struct HttpRouter {
    port: u16,
    routes: RwLock<HashMap<RouteKey, Binding>>,
    next_handle: AtomicU64,
}

impl HttpRouter {
    /// Empty table for the listener on `port`
    pub fn new(port: u16) -> Self {
        Self {
            port,
            routes: RwLock::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Port of the listener this table serves
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind `handler` to `method` + `path`.
    ///
    /// Fails if the pair is already bound; unbind it first.
    pub fn bind(
        &self,
        method: Method,
        path: &str,
        handler: RouteHandler,
    ) -> Result<RouteHandle, RouteError> {
        let key = RouteKey {
            method,
            path: path.to_string(),
        };

        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        if routes.contains_key(&key) {
            return Err(RouteError::AlreadyBound(key));
        }

        let handle = RouteHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        debug!("Bound route {} to {:?}", key, handler);
        routes.insert(key, Binding { handle, handler });
        Ok(handle)
    }

    /// Remove the binding for `handle`. Returns false for unknown handles.
    pub fn unbind(&self, handle: RouteHandle) -> bool {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        let before = routes.len();
        routes.retain(|key, binding| {
            let keep = binding.handle != handle;
            if !keep {
                debug!("Unbound route {}", key);
            }
            keep
        });
        routes.len() != before
    }

    /// Handler bound to `method` + `path`
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteHandler> {
        let key = RouteKey {
            method: method.clone(),
            path: path.to_string(),
        };
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        routes.get(&key).map(|binding| binding.handler)
    }

    /// Currently bound routes
    pub fn routes(&self) -> Vec<RouteKey> {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        routes.keys().cloned().collect()
    }

    /// True when nothing is bound
    pub fn is_empty(&self) -> bool {
        self.routes.read().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}
