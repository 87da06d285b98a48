//! Daemon startup tests.
//!
//! Tests that an unreachable container runtime is fatal.

use nsattach_core::config::{NsattachConfig, WatcherConfig};
use nsattach_daemon::app;

fn config_with_socket(socket: &str) -> NsattachConfig {
    NsattachConfig {
        watcher: WatcherConfig {
            image: "myapp".to_owned(),
            interface: "fakmac0".to_owned(),
            socket: socket.to_owned(),
            ..WatcherConfig::default()
        },
        ..NsattachConfig::default()
    }
}

#[tokio::test]
async fn test_run_fails_on_unreachable_socket() {
    // Given: A valid config pointing at a socket that does not exist
    let config = config_with_socket("unix:///nonexistent/podman.sock");
    config.validate().expect("config should be valid");

    // When: Running the daemon
    let result = app::run(config).await;

    // Then: Startup fails instead of waiting for events
    let err = result.expect_err("unreachable runtime should be fatal");
    let msg = err.to_string();
    assert!(msg.contains("failed to connect"), "{msg}");
    assert!(msg.contains("/nonexistent/podman.sock"), "{msg}");
}

#[tokio::test]
async fn test_run_fails_when_socket_is_not_a_runtime() {
    // Given: A socket path that exists but is a regular file
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("podman.sock");
    std::fs::write(&path, b"").expect("should create file");
    let config = config_with_socket(&format!("unix://{}", path.display()));

    // When: Running the daemon
    let result = app::run(config).await;

    // Then: The ping fails and startup is aborted
    let err = result.expect_err("non-runtime socket should be fatal");
    assert!(err.to_string().contains("failed to connect"), "{err}");
}
