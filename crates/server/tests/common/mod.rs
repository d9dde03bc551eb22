//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! with a mock converter and in-memory stores, enabling API tests without
//! external conversion engines.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use gobbler_core::{
    progress::ProgressStore,
    testing::{fixtures, MockConverter},
    AdmissionController, BatchConfig, BatchService, Config, ConverterInvoker, ConverterKind,
    ConverterRegistry, JobQueue, SqliteJobQueue,
};
use gobbler_server::{api::create_router, state::AppState};

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_submit() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/batches", json!({
///         "kind": "webpage",
///         "urls": ["https://example.com"]
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock converter registered for the webpage kind
    pub converter: Arc<MockConverter>,
    /// Temporary directory for batch output
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture with an in-memory progress store.
    pub fn new() -> Self {
        Self::build(MockConverter::new(), None)
    }

    /// Create a fixture whose webpage converter is `converter`.
    pub fn with_converter(converter: MockConverter) -> Self {
        Self::build(converter, None)
    }

    /// Create a fixture over a specific progress store.
    pub fn with_progress_store(store: Arc<dyn ProgressStore>) -> Self {
        Self::build(MockConverter::new(), Some(store))
    }

    fn build(converter: MockConverter, store: Option<Arc<dyn ProgressStore>>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let converter = Arc::new(converter);

        let mut converters = ConverterRegistry::new();
        converters.register(ConverterKind::Webpage, Arc::clone(&converter) as Arc<dyn ConverterInvoker>);

        let tracker = match store {
            Some(store) => fixtures::spawn_tracker(store),
            None => fixtures::memory_tracker(),
        };
        let queue: Arc<dyn JobQueue> =
            Arc::new(SqliteJobQueue::in_memory().expect("Failed to create job queue"));

        let config = Config::default();
        let service = Arc::new(BatchService::new(
            BatchConfig::default(),
            AdmissionController::new(config.admission.clone()),
            converters,
            tracker,
            queue,
        ));
        let router = create_router(Arc::new(AppState::new(config, service)));

        Self {
            router,
            converter,
            temp_dir,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: String) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Raw body text, for non-JSON endpoints.
    pub async fn get_text(&self, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, body }
    }
}

/// `https://example.com/1` .. `https://example.com/n`
pub fn urls(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("https://example.com/{}", i)).collect()
}
