//! Integration tests for mcp-control
//!
//! These tests verify the interaction between configuration, the controller
//! and the audit log.

use mcp_control::config::Config;
use mcp_control::control::AssetExecutor;
use mcp_control::controller::Controller;
use mcp_control::error::StartError;
use mcp_control::monitoring::RequestLogEntry;
use std::sync::Arc;
use tempfile::TempDir;

fn executor() -> Arc<AssetExecutor> {
    Arc::new(AssetExecutor::in_memory())
}

#[test]
fn test_config_file_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested/mcp-control.toml");

    let mut config = Config::default();
    config.server.default_port = 9090;
    config.server.auto_start = true;
    config.ui.max_log_entries = 250;
    config.to_file(&path).unwrap();

    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded.server.default_port, 9090);
    assert!(loaded.server.auto_start);
    assert_eq!(loaded.ui.max_log_entries, 250);
}

#[test]
fn test_partial_config_uses_defaults() {
    let config = Config::parse(
        r#"
[server]
default_port = 9191
"#,
    )
    .unwrap();

    assert_eq!(config.server.default_port, 9191);
    assert_eq!(config.server.command_path, "/add_node");
    assert_eq!(config.ui.max_log_entries, 100);
    assert!(config.ui.show_request_logs);
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.toml");
    std::fs::write(&path, "[server]\ndefault_port = 80\n").unwrap();

    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_controller_applies_log_capacity() {
    let mut config = Config::default();
    config.ui.max_log_entries = 10;
    let controller = Controller::new(config, executor()).unwrap();

    let audit = controller.audit_log();
    for i in 0..15 {
        audit.append(RequestLogEntry::new("GET", format!("/r{}", i), 200, None));
    }

    let logs = controller.request_logs();
    assert_eq!(logs.len(), 10);
    assert_eq!(logs[0].path, "/r5");
    assert_eq!(logs[9].path, "/r14");
}

#[test]
fn test_shrinking_capacity_evicts_on_next_append() {
    let controller = Controller::new(Config::default(), executor()).unwrap();
    let audit = controller.audit_log();
    for i in 0..30 {
        audit.append(RequestLogEntry::new("GET", format!("/r{}", i), 200, None));
    }

    controller.set_max_log_entries(10).unwrap();
    assert_eq!(controller.request_logs().len(), 30);

    audit.append(RequestLogEntry::new("GET", "/last", 200, None));
    let logs = controller.request_logs();
    assert_eq!(logs.len(), 10);
    assert_eq!(logs[9].path, "/last");
}

#[tokio::test]
async fn test_auto_start_on_initialize() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = Config::default();
    config.server.auto_start = true;
    config.server.default_port = port;

    let controller = Controller::new(config, executor()).unwrap();
    controller.initialize().await.unwrap();
    assert!(controller.is_server_running());
    assert_eq!(controller.server_port(), port);
    assert!(controller.uptime().is_some());

    controller.shutdown().await;
    assert!(!controller.is_server_running());
}

#[tokio::test]
async fn test_privileged_port_is_refused() {
    let controller = Controller::new(Config::default(), executor()).unwrap();
    let err = controller.start_server(Some(443)).await.unwrap_err();
    assert!(matches!(err, StartError::InvalidPort(443)));
    assert_eq!(controller.server_status(), "Stopped");
}

#[tokio::test]
async fn test_restart_when_stopped_uses_default_port() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = Config::default();
    config.server.default_port = port;
    let controller = Controller::new(config, executor()).unwrap();

    controller.restart_server().await.unwrap();
    assert_eq!(controller.server_port(), port);

    controller.shutdown().await;
}
