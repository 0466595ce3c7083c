//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! with real SQLite stores in a temp dir and mock collaborators, so the
//! whole operator surface can be driven without a network.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use conveyor_core::{
    testing::{MockCollaborators, StaticSampler},
    Collaborators, Config, DatabaseConfig, ErrorLog, EventBus, ItemStore, LoadSampler,
    OrchestratorConfig, PipelineOrchestrator, ResourceGovernor, SqliteErrorLog, SqliteItemStore,
    StageExecutor, StageExecutorConfig,
};
use conveyor_server::api::{create_router, forward_events, WsBroadcaster};
use conveyor_server::state::AppState;

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use conveyor_core::testing::fixtures;

/// Test fixture for API testing with mock collaborators.
///
/// The orchestrator is created but never started; tests drive it with
/// [`PipelineOrchestrator::tick`] so every step is deterministic.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_manual_insert() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/items", json!({ "name": "Widget" })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
#[allow(dead_code)]
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub store: Arc<SqliteItemStore>,
    pub errors: Arc<SqliteErrorLog>,
    /// Mock collaborators - inject failures, inspect calls
    pub mock: Arc<MockCollaborators>,
    pub sampler: Arc<StaticSampler>,
    pub bus: EventBus,
    pub orchestrator: Arc<PipelineOrchestrator>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let busy = Duration::from_millis(2000);

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
                busy_timeout_ms: 2000,
            },
            orchestrator: OrchestratorConfig {
                enabled: false,
                item_delay_ms: 0,
                throttled_item_delay_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };

        let store =
            Arc::new(SqliteItemStore::new(&db_path, busy).expect("Failed to create item store"));
        let errors =
            Arc::new(SqliteErrorLog::new(&db_path, busy).expect("Failed to create error log"));

        let mock = Arc::new(MockCollaborators::new());
        let sampler = Arc::new(StaticSampler::new(20.0, 30.0));
        let bus = EventBus::new();
        let ws_broadcaster = WsBroadcaster::default();
        forward_events(&bus, ws_broadcaster.clone());

        let executor = StageExecutor::new(
            Collaborators::from_single(Arc::clone(&mock)),
            StageExecutorConfig {
                stage_timeout: Duration::from_secs(5),
                tracking_base_url: None,
            },
        );
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            config.orchestrator.clone(),
            Arc::clone(&store) as Arc<dyn ItemStore>,
            Arc::clone(&errors) as Arc<dyn ErrorLog>,
            ResourceGovernor::new(Arc::clone(&sampler) as Arc<dyn LoadSampler>),
            executor,
            bus.clone(),
        ));

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&store) as Arc<dyn ItemStore>,
            Arc::clone(&errors) as Arc<dyn ErrorLog>,
            bus.clone(),
            Some(Arc::clone(&orchestrator)),
            ws_broadcaster,
        ));

        Self {
            router: create_router(state),
            store,
            errors,
            mock,
            sampler,
            bus,
            orchestrator,
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

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Fetch a non-JSON body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
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

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
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
