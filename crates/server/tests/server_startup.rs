//! Tests that spawn the `tubepipe` binary and talk to it over HTTP.
#![cfg(unix)]

use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

use tubepipe_core::testing::fixtures;

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Config pointing at script stand-ins inside `dir`
fn script_config(dir: &Path, port: u16) -> String {
    let acquire = fixtures::zero_source(dir, 100_000).unwrap();
    let transcode = fixtures::passthrough(dir).unwrap();
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"

[tools]
acquisition_path = "{}"
transcode_path = "{}"
verify_on_startup = false
"#,
        port,
        dir.join("jobs.db").display(),
        acquire.display(),
        transcode.display()
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
fn spawn_server(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_tubepipe"))
        .env("TUBEPIPE_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let config = write_config(&script_config(dir.path(), port));

    let mut server = spawn_server(config.path());
    assert!(wait_for_server(port, 100).await, "Server did not start in time");

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/api/health", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_create_and_stream_over_http() {
    let dir = TempDir::new().unwrap();
    let port = get_available_port();
    let config = write_config(&script_config(dir.path(), port));

    let mut server = spawn_server(config.path());
    assert!(wait_for_server(port, 100).await, "Server did not start in time");

    let client = Client::new();
    let created: serde_json::Value = client
        .post(format!("http://127.0.0.1:{}/api/jobs", port))
        .json(&serde_json::json!({ "url": "https://www.youtube.com/watch?v=abc", "format": "audio" }))
        .send()
        .await
        .expect("Failed to create job")
        .json()
        .await
        .unwrap();

    let stream_url = created["stream_url"].as_str().unwrap();
    let response = client
        .get(format!("http://127.0.0.1:{}{}", port, stream_url))
        .send()
        .await
        .expect("Failed to open stream");

    assert!(response.status().is_success());
    assert_eq!(response.headers()["content-type"], "audio/mpeg");
    let body = response.bytes().await.unwrap();
    assert_eq!(body.len(), 100_000);

    let job: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/api/jobs/{}", port, created["id"].as_str().unwrap()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(job["status"], "completed");
    assert_eq!(job["bytes_streamed"], 100_000);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_env_overrides_config_file() {
    let dir = TempDir::new().unwrap();
    let file_port = get_available_port();
    let env_port = get_available_port();
    let config = write_config(&script_config(dir.path(), file_port));

    let mut server = tokio::process::Command::new(env!("CARGO_BIN_EXE_tubepipe"))
        .env("TUBEPIPE_CONFIG", config.path())
        .env("TUBEPIPE_SERVER__PORT", env_port.to_string())
        .env("RUST_LOG", "error")
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server");

    assert!(
        wait_for_server(env_port, 100).await,
        "Server did not listen on the env port"
    );

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_tubepipe"))
            .env("TUBEPIPE_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_unusable_tools_exit_with_error() {
    let port = get_available_port();
    let config = write_config(&format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[tools]
acquisition_path = "/nonexistent/yt-dlp"
transcode_path = "/nonexistent/ffmpeg"
verify_on_startup = true
"#,
        port
    ));

    let result = timeout(
        Duration::from_secs(10),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_tubepipe"))
            .env("TUBEPIPE_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
