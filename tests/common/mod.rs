//! Shared test utilities.

#![allow(dead_code)]

use std::net::TcpListener;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use restrosync::SyncConfig;
use tempfile::TempDir;

/// Find an available port for testing.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to free port");
    listener.local_addr().unwrap().port()
}

/// Config pointed at a local test server, with fast retries.
pub fn test_config(port: u16) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = port;
    config.reconnect.retry_secs = 1;
    config.reconnect.connect_retry_secs = 1;
    config
}

/// Temp dir plus a state-file path inside it.
pub fn temp_state() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("state.json");
    (dir, path)
}

/// Poll until `condition` holds, failing the test after 5 seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met within 5s");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
