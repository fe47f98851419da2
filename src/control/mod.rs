//! Control API for external applications
//!
//! This module provides the HTTP control surface: a lifecycle-managed
//! listener, the command and status routes, and the executor boundary the
//! command route delegates to.

pub mod api;
mod dispatcher;
mod executor;
mod notifier;
mod router;
mod server;

pub use api::{CommandRequest, CommandResponse, ProtocolError, StatusReply};
pub use dispatcher::{service, RouteDispatcher, MAX_BODY_BYTES};
pub use executor::{Asset, AssetExecutor, CommandExecutor, GraphNode, PRINT_STRING};
pub use notifier::{StatusChange, StatusNotifier};
pub use router::{HttpRouter, RouteError, RouteHandle, RouteHandler, RouteKey};
pub use server::{ControlServer, ServerState, MIN_PORT};
