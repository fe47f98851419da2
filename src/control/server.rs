//! Control server lifecycle
//!
//! [`ControlServer`] owns the listening socket and the running/stopped state.
//! Start, stop and restart are serialized by one async mutex; state queries
//! read a separate cell and never wait on a lifecycle operation.
//!
//! Stopping unbinds the routes, stops accepting, and gives in-flight requests
//! up to the configured shutdown timeout to finish before the serving task is
//! aborted. Executor calls already running on the blocking pool are not
//! cancelled.

use crate::config::ServerConfig;
use crate::control::dispatcher::{self, RouteDispatcher};
use crate::control::executor::CommandExecutor;
use crate::control::notifier::{StatusChange, StatusNotifier};
use crate::control::router::HttpRouter;
use crate::error::{Result, StartError};
use crate::monitoring::AuditLog;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Lowest port accepted besides 0
pub const MIN_PORT: u16 = 1024;

/// Server state. The port is nonzero exactly when running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    /// Not listening
    #[default]
    Stopped,
    /// Listening with routes bound
    Running {
        /// Bound port
        port: u16,
        /// When the server started (UTC)
        started_at: OffsetDateTime,
    },
}

impl ServerState {
    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        matches!(self, ServerState::Running { .. })
    }

    /// Bound port, 0 when stopped
    pub fn port(&self) -> u16 {
        match self {
            ServerState::Running { port, .. } => *port,
            ServerState::Stopped => 0,
        }
    }

    /// Start time while running
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        match self {
            ServerState::Running { started_at, .. } => Some(*started_at),
            ServerState::Stopped => None,
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerState::Stopped => write!(f, "Stopped"),
            ServerState::Running { port, .. } => write!(f, "Running on port {}", port),
        }
    }
}

/// Lock-protected [`ServerState`].
///
/// Written only while the lifecycle lock is held; read without it.
#[derive(Debug, Default)]
pub struct StateCell {
    inner: RwLock<ServerState>,
}

impl StateCell {
    /// Current state
    pub fn get(&self) -> ServerState {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the state
    pub fn set(&self, state: ServerState) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.get().is_running()
    }

    /// Bound port, 0 when stopped
    pub fn port(&self) -> u16 {
        self.get().port()
    }
}

struct RunningServer {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// Control server manages the listening socket and route lifecycle.
///
/// Dropping a running server signals the serving task to shut down.
pub struct ControlServer {
    bind_ip: IpAddr,
    shutdown_timeout: Duration,
    state: StateCell,
    dispatcher: Arc<RouteDispatcher>,
    notifier: StatusNotifier,
    lifecycle: Mutex<Option<RunningServer>>,
}

impl ControlServer {
    /// Create a stopped server
    pub fn new(
        config: &ServerConfig,
        executor: Arc<dyn CommandExecutor>,
        audit: Arc<AuditLog>,
    ) -> Result<Self> {
        config.validate()?;

        let dispatcher = Arc::new(RouteDispatcher::new(
            executor,
            audit,
            config.command_path.clone(),
        ));

        Ok(Self {
            bind_ip: config.bind_ip()?,
            shutdown_timeout: config.shutdown_timeout(),
            state: StateCell::default(),
            dispatcher,
            notifier: StatusNotifier::default(),
            lifecycle: Mutex::new(None),
        })
    }

    /// Start listening on `port` (0 picks an ephemeral port).
    ///
    /// Fails with [`StartError::AlreadyRunning`] without side effects when the
    /// server is already up. Any other failure leaves the server stopped with
    /// nothing bound.
    pub async fn start(&self, port: u16) -> std::result::Result<(), StartError> {
        let mut running = self.lifecycle.lock().await;
        self.start_locked(&mut running, port).await
    }

    /// Stop the server. No-op when already stopped; never fails.
    pub async fn stop(&self) {
        let mut running = self.lifecycle.lock().await;
        self.stop_locked(&mut running).await;
    }

    /// Stop, then start again.
    ///
    /// Reuses the bound port when running, otherwise starts on `port`. The
    /// server is unreachable between the two steps; other lifecycle calls
    /// wait until the restart finishes.
    pub async fn restart(&self, port: u16) -> std::result::Result<(), StartError> {
        let mut running = self.lifecycle.lock().await;
        let port = match self.state.get() {
            ServerState::Running { port, .. } => port,
            ServerState::Stopped => port,
        };

        info!("Restarting control server on port {}", port);
        self.stop_locked(&mut running).await;
        self.start_locked(&mut running, port).await
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Bound port, 0 when stopped
    pub fn port(&self) -> u16 {
        self.state.port()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    /// Time since start while running
    pub fn uptime(&self) -> Option<Duration> {
        let started_at = self.state.get().started_at()?;
        Duration::try_from(OffsetDateTime::now_utc() - started_at).ok()
    }

    /// Subscribe to status changes
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.notifier.subscribe()
    }

    /// Status change channel
    pub fn notifier(&self) -> &StatusNotifier {
        &self.notifier
    }

    /// Route dispatcher serving this server's requests
    pub fn dispatcher(&self) -> &Arc<RouteDispatcher> {
        &self.dispatcher
    }

    async fn start_locked(
        &self,
        running: &mut Option<RunningServer>,
        port: u16,
    ) -> std::result::Result<(), StartError> {
        if let ServerState::Running { port: current, .. } = self.state.get() {
            warn!("Control server is already running on port {}", current);
            return Err(StartError::AlreadyRunning { port: current });
        }

        if port != 0 && port < MIN_PORT {
            error!("Refusing to start on privileged port {}", port);
            return Err(StartError::InvalidPort(port));
        }

        let listener = TcpListener::bind((self.bind_ip, port)).await.map_err(|source| {
            error!("Failed to bind {}:{}: {}", self.bind_ip, port, source);
            StartError::Bind { port, source }
        })?;
        let bound_port = listener
            .local_addr()
            .map_err(|source| StartError::Bind { port, source })?
            .port();

        let router = Arc::new(HttpRouter::new(bound_port));
        self.dispatcher.attach(router.clone());
        if let Err(e) = self.dispatcher.bind_routes() {
            error!("Failed to bind HTTP routes: {}", e);
            self.dispatcher.detach();
            return Err(e);
        }

        // Running before the first request can be served
        self.state.set(ServerState::Running {
            port: bound_port,
            started_at: OffsetDateTime::now_utc(),
        });

        let app = dispatcher::service(self.dispatcher.clone(), router)
            .into_make_service_with_connect_info::<SocketAddr>();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    // A dropped sender also means shut down
                    let _ = shutdown_rx.await;
                })
                .await
        });

        *running = Some(RunningServer { shutdown, task });

        info!("Control server started on {}:{}", self.bind_ip, bound_port);
        self.notifier.publish(StatusChange {
            running: true,
            port: bound_port,
        });
        Ok(())
    }

    async fn stop_locked(&self, running: &mut Option<RunningServer>) {
        let Some(server) = running.take() else {
            debug!("Control server is not running");
            return;
        };

        self.dispatcher.unbind_routes();
        self.dispatcher.detach();

        if server.shutdown.send(()).is_err() {
            debug!("Serving task already exited");
        }

        let mut task = server.task;
        match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
            Ok(Ok(Ok(()))) => debug!("Serving task drained"),
            Ok(Ok(Err(e))) => warn!("Control server exited with error: {}", e),
            Ok(Err(e)) => warn!("Serving task failed: {}", e),
            Err(_) => {
                warn!(
                    "Requests still in flight after {:?}; closing connections",
                    self.shutdown_timeout
                );
                task.abort();
            }
        }

        self.state.set(ServerState::Stopped);
        info!("Control server stopped");
        self.notifier.publish(StatusChange {
            running: false,
            port: 0,
        });
    }
}
