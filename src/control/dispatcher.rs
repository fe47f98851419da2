//! Route dispatcher for the control API
//!
//! Binds the command and status routes on the active listener, turns request
//! bodies into executor calls, and records one audit entry per request. Every
//! outcome, including malformed input and executor panics, becomes a JSON
//! body; nothing escapes as a transport error.

use crate::config::STATUS_PATH;
use crate::control::api::{self, CommandRequest, CommandResponse, StatusReply};
use crate::control::executor::CommandExecutor;
use crate::control::router::{HttpRouter, RouteHandle, RouteHandler};
use crate::error::StartError;
use crate::monitoring::{AuditLog, RequestLogEntry};
use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Largest request body read from a client
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Default)]
struct Bindings {
    router: Option<Arc<HttpRouter>>,
    command: Option<RouteHandle>,
    status: Option<RouteHandle>,
}

/// Owns the route bindings and handles requests on them
pub struct RouteDispatcher {
    executor: Arc<dyn CommandExecutor>,
    audit: Arc<AuditLog>,
    command_path: String,
    request_logging: AtomicBool,
    bindings: Mutex<Bindings>,
}

impl RouteDispatcher {
    /// Create a dispatcher serving commands on `command_path`
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        audit: Arc<AuditLog>,
        command_path: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            audit,
            command_path: command_path.into(),
            request_logging: AtomicBool::new(true),
            bindings: Mutex::new(Bindings::default()),
        }
    }

    /// Path of the command route
    pub fn command_path(&self) -> &str {
        &self.command_path
    }

    /// Log each request at info (true) or debug (false)
    pub fn set_request_logging(&self, enabled: bool) {
        self.request_logging.store(enabled, Ordering::Relaxed);
    }

    /// Make `router` the listener routes are bound on
    pub fn attach(&self, router: Arc<HttpRouter>) {
        self.bindings().router = Some(router);
    }

    /// Forget the current listener, returning it
    pub fn detach(&self) -> Option<Arc<HttpRouter>> {
        self.bindings().router.take()
    }

    /// Bind the command and status routes.
    ///
    /// Fails without side effects if no listener is attached or routes are
    /// already bound. If the status route cannot be bound the command route
    /// is removed again.
    pub fn bind_routes(&self) -> Result<(), StartError> {
        let mut bindings = self.bindings();

        let router = bindings
            .router
            .clone()
            .ok_or_else(|| StartError::RouteBind("listener is not available".to_string()))?;

        if bindings.command.is_some() || bindings.status.is_some() {
            return Err(StartError::RouteBind("routes are already bound".to_string()));
        }

        let command = router
            .bind(Method::POST, &self.command_path, RouteHandler::Command)
            .map_err(|e| StartError::RouteBind(e.to_string()))?;

        let status = match router.bind(Method::GET, STATUS_PATH, RouteHandler::Status) {
            Ok(handle) => handle,
            Err(e) => {
                router.unbind(command);
                return Err(StartError::RouteBind(e.to_string()));
            }
        };

        bindings.command = Some(command);
        bindings.status = Some(status);

        info!(
            "HTTP routes bound: POST {}, GET {}",
            self.command_path, STATUS_PATH
        );
        Ok(())
    }

    /// Unbind both routes. Safe to call when nothing is bound.
    pub fn unbind_routes(&self) {
        let mut bindings = self.bindings();
        let handles = [bindings.command.take(), bindings.status.take()];

        let Some(router) = bindings.router.clone() else {
            return;
        };

        let mut unbound = false;
        for handle in handles.into_iter().flatten() {
            unbound |= router.unbind(handle);
        }

        if unbound {
            info!("HTTP routes unbound");
        }
    }

    /// True while both routes are bound
    pub fn routes_bound(&self) -> bool {
        let bindings = self.bindings();
        bindings.command.is_some() && bindings.status.is_some()
    }

    /// Handle a command request body
    pub async fn handle_command(
        &self,
        body: &[u8],
        path: &str,
        client: Option<SocketAddr>,
    ) -> CommandResponse {
        let response = self.run_command(body).await;
        self.record(Method::POST, path, StatusCode::OK, client);
        response
    }

    /// Handle a status request arriving on the listener bound to `port`
    pub fn handle_status(&self, port: u16, path: &str, client: Option<SocketAddr>) -> StatusReply {
        let reply = StatusReply::running(port);
        self.record(Method::GET, path, StatusCode::OK, client);
        reply
    }

    /// Answer a request no route is bound for
    pub fn handle_unrouted(
        &self,
        method: &Method,
        path: &str,
        client: Option<SocketAddr>,
    ) -> CommandResponse {
        self.record(method.clone(), path, StatusCode::NOT_FOUND, client);
        CommandResponse::failure(format!("No route for {} {}", method, path), BTreeMap::new())
    }

    async fn run_command(&self, body: &[u8]) -> CommandResponse {
        let fields = match api::parse_body(body) {
            Ok(fields) => fields,
            Err(e) => {
                warn!("Failed to parse JSON request body ({} bytes)", body.len());
                return e.into();
            }
        };

        let request = match CommandRequest::from_fields(&fields) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected command request: {}", e);
                return CommandResponse::failure(e.to_string(), api::echo_fields(&fields));
            }
        };

        let echo = request.echo();
        let target = request.target().to_string();
        let CommandRequest { action, params } = request;
        info!("Command request - target: {}, action: {}", target, action);

        let executor = self.executor.clone();
        let action_name = action.clone();
        let outcome =
            tokio::task::spawn_blocking(move || executor.execute(&action_name, &params)).await;

        match outcome {
            Ok(Ok(message)) => CommandResponse::success(message, echo),
            Ok(Err(e)) => {
                warn!("Command {} on '{}' failed: {}", action, target, e);
                CommandResponse::failure(e.to_string(), echo)
            }
            Err(e) => {
                error!("Command executor failed: {}", e);
                CommandResponse::failure(format!("Command executor failed: {}", e), echo)
            }
        }
    }

    fn record(&self, method: Method, path: &str, status: StatusCode, client: Option<SocketAddr>) {
        let entry = RequestLogEntry::new(method.as_str(), path, status.as_u16(), client);
        if self.request_logging.load(Ordering::Relaxed) {
            info!("Request: {}", entry);
        } else {
            debug!("Request: {}", entry);
        }
        self.audit.append(entry);
    }

    fn bindings(&self) -> MutexGuard<'_, Bindings> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
struct ServeContext {
    router: Arc<HttpRouter>,
    dispatcher: Arc<RouteDispatcher>,
}

/// Build the axum service answering requests through `router`.
///
/// Every request goes through one fallback handler so that routes can be
/// bound and unbound while the listener is live.
pub fn service(dispatcher: Arc<RouteDispatcher>, router: Arc<HttpRouter>) -> axum::Router {
    axum::Router::new()
        .fallback(dispatch)
        .with_state(ServeContext { router, dispatcher })
}

async fn dispatch(State(ctx): State<ServeContext>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let client = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let path = parts.uri.path().to_string();

    match ctx.router.lookup(&parts.method, &path) {
        Some(RouteHandler::Command) => {
            let body = read_body(body).await;
            Json(ctx.dispatcher.handle_command(&body, &path, client).await).into_response()
        }
        Some(RouteHandler::Status) => {
            let reply = ctx.dispatcher.handle_status(ctx.router.port(), &path, client);
            Json(reply).into_response()
        }
        None => {
            let reply = ctx.dispatcher.handle_unrouted(&parts.method, &path, client);
            (StatusCode::NOT_FOUND, Json(reply)).into_response()
        }
    }
}

// An unreadable body is handled like an empty one: it fails JSON parsing.
async fn read_body(body: Body) -> Vec<u8> {
    match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            Vec::new()
        }
    }
}
