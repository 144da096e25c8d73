//! Common test utilities for API testing.
//!
//! This module provides a test fixture that builds the in-process router with
//! a SQLite ledger in a temp dir, a mock title resolver and shell-script
//! stand-ins for the acquisition and transcode tools.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use tubepipe_core::testing::MockTitleResolver;
use tubepipe_core::{Config, JobStore, SqliteJobStore, StreamContext, StreamOrchestrator};
use tubepipe_server::{create_router, AppState};

/// Re-export fixtures for test convenience
pub use tubepipe_core::testing::fixtures;

/// Bytes the default acquisition stand-in writes.
pub const SOURCE_BYTES: usize = 300_000;

/// Test fixture wrapping the router.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_job_creation() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/jobs", json!({
///         "url": "https://www.youtube.com/watch?v=abc",
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Ledger shared with the router
    pub jobs: Arc<SqliteJobStore>,
    /// Mock title resolver - configure resolved titles
    pub titles: MockTitleResolver,
    /// Temporary directory for the database and tool scripts
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response whose body is kept as raw bytes
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestFixture {
    /// Fixture whose acquisition tool emits `SOURCE_BYTES` zero bytes.
    pub fn new() -> Self {
        Self::with_tools(|dir| {
            (
                fixtures::zero_source(dir, SOURCE_BYTES).expect("Failed to write acquisition script"),
                fixtures::passthrough(dir).expect("Failed to write transcode script"),
            )
        })
    }

    /// Fixture with custom acquisition and transcode executables.
    pub fn with_tools(tools: impl FnOnce(&std::path::Path) -> (PathBuf, PathBuf)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.database.path = temp_dir.path().join("test.db");
        let (acquisition, transcode) = tools(temp_dir.path());
        config.tools.acquisition_path = acquisition;
        config.tools.transcode_path = transcode;
        config.tools.verify_on_startup = false;

        let jobs = Arc::new(
            SqliteJobStore::new(&config.database.path).expect("Failed to create job store"),
        );
        let titles = MockTitleResolver::new("Test Clip");
        let ctx = StreamContext::new(&config, Arc::clone(&jobs) as Arc<dyn JobStore>)
            .with_title_resolver(Arc::new(titles.clone()));
        let orchestrator = Arc::new(StreamOrchestrator::new(ctx));

        let state = Arc::new(AppState::new(config, orchestrator));
        let router = create_router(state);

        Self {
            router,
            jobs,
            titles,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let raw = self.send(request).await;
        TestResponse {
            status: raw.status,
            body: parse_json(&raw.body),
        }
    }

    /// Send a GET request and keep the body as bytes.
    pub async fn get_raw(&self, path: &str) -> RawResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        self.send(request).await
    }

    /// Create a job and return its id.
    pub async fn create_job(&self, body: Value) -> String {
        let response = self.post("/api/jobs", body).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"]
            .as_str()
            .expect("id should be a string")
            .to_string()
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        let raw = self.send(request).await;

        TestResponse {
            status: raw.status,
            body: parse_json(&raw.body),
        }
    }

    async fn send(&self, request: Request<Body>) -> RawResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        RawResponse {
            status,
            headers,
            body,
        }
    }
}

fn parse_json(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap_or(Value::Null)
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
