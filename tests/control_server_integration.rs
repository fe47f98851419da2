//! Self-contained integration tests for the control server
//!
//! These tests start their own server on an ephemeral loopback port and talk
//! to it over HTTP, so they don't require a separately running server.

use mcp_control::client::ControlClient;
use mcp_control::config::Config;
use mcp_control::control::{AssetExecutor, CommandExecutor, CommandRequest, CommandResponse};
use mcp_control::controller::Controller;
use mcp_control::error::{ActionError, ControlError, StartError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Executor that accepts every action and counts calls
#[derive(Default)]
struct CountingExecutor {
    calls: AtomicUsize,
}

impl CommandExecutor for CountingExecutor {
    fn execute(&self, action: &str, params: &HashMap<String, String>) -> Result<String, ActionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let target = params.get("blueprint_path").cloned().unwrap_or_default();
        Ok(format!("ran {} on {}", action, target))
    }
}

async fn start(executor: Arc<dyn CommandExecutor>) -> (Controller, ControlClient) {
    let controller = Controller::new(Config::new(), executor).expect("Failed to create controller");
    controller
        .start_server(Some(0))
        .await
        .expect("Failed to start server");

    let client = ControlClient::new("127.0.0.1", controller.server_port())
        .expect("Failed to create client");
    (controller, client)
}

async fn post_raw(client: &ControlClient, body: &'static str) -> (u16, CommandResponse) {
    let response = reqwest::Client::new()
        .post(format!("{}/add_node", client.base_url()))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .expect("Request failed");
    let status = response.status().as_u16();
    let reply = response.json().await.expect("Response was not JSON");
    (status, reply)
}

/// Test a full command round trip through the executor
#[tokio::test]
async fn test_command_round_trip() {
    let executor = Arc::new(CountingExecutor::default());
    let (controller, client) = start(executor.clone()).await;

    let reply = client
        .send(&CommandRequest::new("PrintString", "/Game/MyAsset"))
        .await
        .expect("Failed to send command");

    assert!(reply.success);
    assert_eq!(reply.message, "ran PrintString on /Game/MyAsset");
    assert_eq!(reply.field("blueprint_path"), Some("/Game/MyAsset"));
    assert_eq!(reply.field("node_type"), Some("PrintString"));
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);

    controller.shutdown().await;
}

/// Test that the asset executor creates and persists assets
#[tokio::test]
async fn test_asset_executor_over_http() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let executor = Arc::new(AssetExecutor::with_root(temp_dir.path()));
    let (controller, client) = start(executor.clone()).await;

    let reply = client
        .send(&CommandRequest::new("PrintString", "/Game/MyAsset"))
        .await
        .unwrap();
    assert!(reply.success, "unexpected failure: {}", reply.message);
    assert_eq!(reply.message, "Asset created with PrintString node at '/Game/MyAsset'");

    let asset = executor.asset("/Game/MyAsset").expect("asset was not recorded");
    assert_eq!(asset.name, "MyAsset");
    assert_eq!(asset.nodes.len(), 1);
    assert!(temp_dir.path().join("Game/MyAsset.json").exists());

    controller.shutdown().await;
}

/// Test that unsupported actions fail in-band without touching assets
#[tokio::test]
async fn test_unsupported_action() {
    let executor = Arc::new(AssetExecutor::in_memory());
    let (controller, client) = start(executor.clone()).await;

    let reply = client
        .send(&CommandRequest::new("Branch", "/Game/MyAsset"))
        .await
        .unwrap();

    assert!(!reply.success);
    assert_eq!(reply.message, "Unsupported node type 'Branch'");
    assert_eq!(reply.field("node_type"), Some("Branch"));
    assert_eq!(executor.asset_count(), 0);

    controller.shutdown().await;
}

/// Test that malformed bodies are answered with 200 and a JSON failure
#[tokio::test]
async fn test_malformed_body() {
    let executor = Arc::new(CountingExecutor::default());
    let (controller, client) = start(executor.clone()).await;

    let (status, reply) = post_raw(&client, "this is not json").await;
    assert_eq!(status, 200);
    assert!(!reply.success);
    assert_eq!(reply.message, "Invalid JSON in request body");
    assert!(reply.echo.is_empty());

    let (status, reply) = post_raw(&client, r#"{"node_type":"PrintString"}"#).await;
    assert_eq!(status, 200);
    assert!(!reply.success);
    assert_eq!(reply.message, "Missing required field 'blueprint_path'");
    assert_eq!(reply.field("node_type"), Some("PrintString"));

    assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(controller.request_stats().successful, 2);

    controller.shutdown().await;
}

/// Test that the status route reports the bound port
#[tokio::test]
async fn test_status_reports_port() {
    let (controller, client) = start(Arc::new(CountingExecutor::default())).await;
    let port = controller.server_port();

    let status = client.status().await.expect("Failed to get status");
    assert!(status.server_running);
    assert_eq!(status.port, port);
    assert_eq!(status.version, "1.0");
    assert_eq!(status.status, format!("Control server is running on port {}", port));

    controller.shutdown().await;
}

/// Test that an explicitly requested port is the one reported
#[tokio::test]
async fn test_status_reports_explicit_port() {
    // Reserve a free port, then release it for the server
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let controller = Controller::new(Config::new(), Arc::new(CountingExecutor::default())).unwrap();
    controller.start_server(Some(port)).await.expect("Failed to start server");
    assert_eq!(controller.server_port(), port);
    assert_eq!(controller.server_status(), format!("Running on port {}", port));

    let client = ControlClient::new("127.0.0.1", port).unwrap();
    let status = client.status().await.expect("Failed to get status");
    assert!(status.server_running);
    assert_eq!(status.port, port);

    controller.shutdown().await;
}

/// Test that the command route follows the configured path
#[tokio::test]
async fn test_configured_command_path() {
    let mut config = Config::new();
    config.server.command_path = "/command".to_string();
    let controller = Controller::new(config, Arc::new(CountingExecutor::default())).unwrap();
    controller.start_server(Some(0)).await.unwrap();

    let client = ControlClient::new("127.0.0.1", controller.server_port())
        .unwrap()
        .with_command_path(controller.config().server.command_path.clone());
    let reply = client
        .send(&CommandRequest::new("PrintString", "/Game/MyAsset"))
        .await
        .unwrap();
    assert!(reply.success);

    // The default path is not bound
    let (status, _) = post_raw(&client, r#"{"blueprint_path":"/Game/A","node_type":"PrintString"}"#).await;
    assert_eq!(status, 404);

    controller.shutdown().await;
}

/// Test that restart keeps serving on the same port
#[tokio::test]
async fn test_restart_preserves_port() {
    let (controller, client) = start(Arc::new(CountingExecutor::default())).await;
    let port = controller.server_port();

    controller.restart_server().await.expect("Failed to restart");
    assert!(controller.is_server_running());
    assert_eq!(controller.server_port(), port);
    assert_eq!(client.status().await.unwrap().port, port);

    controller.shutdown().await;
}

/// Test that start is refused while running and stop is idempotent
#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let (controller, client) = start(Arc::new(CountingExecutor::default())).await;
    let port = controller.server_port();

    let err = controller.start_server(Some(0)).await.unwrap_err();
    assert!(matches!(err, StartError::AlreadyRunning { port: p } if p == port));
    assert!(client.is_reachable().await);

    controller.stop_server().await;
    controller.stop_server().await;
    assert!(!controller.is_server_running());
    assert_eq!(controller.server_port(), 0);
}

/// Test that the listener is closed after stop
#[tokio::test]
async fn test_connection_refused_after_stop() {
    let (controller, client) = start(Arc::new(CountingExecutor::default())).await;
    assert!(client.is_reachable().await);

    controller.stop_server().await;

    let err = client.status().await.unwrap_err();
    assert!(matches!(err, ControlError::Http(_)), "unexpected error: {}", err);
}

/// Test that a stopped server can be started again
#[tokio::test]
async fn test_start_after_stop() {
    let (controller, _) = start(Arc::new(CountingExecutor::default())).await;
    controller.stop_server().await;

    controller.start_server(Some(0)).await.expect("Failed to start again");
    let client = ControlClient::new("127.0.0.1", controller.server_port()).unwrap();
    assert!(client.status().await.unwrap().server_running);

    controller.shutdown().await;
}

/// Test that unknown routes answer 404 and are audited as failures
#[tokio::test]
async fn test_unrouted_request() {
    let (controller, client) = start(Arc::new(CountingExecutor::default())).await;

    let http = reqwest::Client::new();
    let response = http
        .get(format!("{}/add_node", client.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let reply: CommandResponse = response.json().await.unwrap();
    assert!(!reply.success);
    assert_eq!(reply.message, "No route for GET /add_node");

    let response = http
        .post(format!("{}/elsewhere", client.base_url()))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let stats = controller.request_stats();
    assert_eq!((stats.total, stats.successful, stats.failed), (2, 0, 2));

    controller.shutdown().await;
}

/// Test that every request is recorded with its client address
#[tokio::test]
async fn test_requests_are_audited() {
    let (controller, client) = start(Arc::new(CountingExecutor::default())).await;

    client.status().await.unwrap();
    client
        .send(&CommandRequest::new("PrintString", "/Game/MyAsset"))
        .await
        .unwrap();

    let logs = controller.request_logs();
    assert_eq!(logs.len(), 2);

    assert_eq!(logs[0].method, "GET");
    assert_eq!(logs[0].path, "/status");
    assert_eq!(logs[1].method, "POST");
    assert_eq!(logs[1].path, "/add_node");
    for entry in &logs {
        assert_eq!(entry.status_code, 200);
        let addr = entry.client_addr.expect("client address missing");
        assert!(addr.ip().is_loopback());
    }
    assert!(logs[0].timestamp <= logs[1].timestamp);

    controller.clear_request_logs();
    assert!(controller.request_logs().is_empty());

    controller.shutdown().await;
}

/// Test that concurrent commands are all served and logged
#[tokio::test]
async fn test_concurrent_requests() {
    let executor = Arc::new(CountingExecutor::default());
    let (controller, client) = start(executor.clone()).await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client
                .send(&CommandRequest::new("PrintString", format!("/Game/Asset{}", i)))
                .await
        }));
    }

    for task in tasks {
        let reply = task.await.unwrap().unwrap();
        assert!(reply.success);
    }

    assert_eq!(executor.calls.load(Ordering::SeqCst), 20);
    assert_eq!(controller.request_stats().total, 20);

    controller.shutdown().await;
}

/// Test that status subscribers see start and stop
#[tokio::test]
async fn test_status_events() {
    let controller = Controller::new(Config::new(), Arc::new(CountingExecutor::default())).unwrap();
    let mut events = controller.subscribe();

    controller.start_server(Some(0)).await.unwrap();
    let port = controller.server_port();
    controller.stop_server().await;

    let started = events.recv().await.unwrap();
    assert!(started.running);
    assert_eq!(started.port, port);

    let stopped = events.recv().await.unwrap();
    assert!(!stopped.running);
    assert_eq!(stopped.port, 0);
}
