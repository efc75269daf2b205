//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling E2E testing without ffmpeg,
//! yt-dlp or an extraction service installed.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use transmux_core::{
    testing::{MockEngine, MockExtractor},
    Config, RemoteMediaResolver, ResolverConfig, ServerConfig, TranscodeOrchestrator,
};

/// Re-export fixtures for test convenience
pub use transmux_core::testing::fixtures;

/// Boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "transmux-test-boundary";

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - The transcoding engine (MockEngine)
/// - Remote media extraction (MockExtractor)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_conversion() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture
///         .post_multipart("/convert/media", &[file_part("a.wav", b"RIFF")], &[("targetFormat", "mp3")])
///         .await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock engine - control loads, executions and progress
    pub engine: MockEngine,
    /// Mock extractor - configure metadata and media
    pub extractor: MockExtractor,
    /// Orchestrator behind the router
    pub orchestrator: Arc<TranscodeOrchestrator>,
}

/// Knobs for [`TestFixture::with_config`].
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Wire the mock extractor into the resolver (otherwise no backend).
    pub extractor_configured: bool,
    /// What the extractor reports when probed.
    pub extractor_available: bool,
    pub max_upload_bytes: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            extractor_configured: true,
            extractor_available: true,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Raw body bytes.
    pub bytes: Vec<u8>,
    /// Body parsed as JSON (`Null` if it is not JSON).
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// One file part of a multipart form.
pub struct FilePart<'a> {
    pub field: &'a str,
    pub filename: &'a str,
    pub bytes: &'a [u8],
}

pub fn file_part<'a>(filename: &'a str, bytes: &'a [u8]) -> FilePart<'a> {
    FilePart {
        field: "file",
        filename,
        bytes,
    }
}

/// Build a `multipart/form-data` body delimited by [`BOUNDARY`].
pub fn multipart_body(files: &[FilePart<'_>], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    for file in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                file.field, file.filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(file.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let engine = MockEngine::new();
        let extractor = MockExtractor::new();
        extractor
            .set_available(test_config.extractor_available)
            .await;

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
                max_upload_bytes: test_config.max_upload_bytes,
            },
            ..Default::default()
        };

        let orchestrator = Arc::new(TranscodeOrchestrator::with_engine(Arc::new(
            engine.clone(),
        )));

        let extractor_backend: Option<Arc<dyn transmux_core::MediaExtractor>> =
            if test_config.extractor_configured {
                Some(Arc::new(extractor.clone()))
            } else {
                None
            };
        let resolver = Arc::new(RemoteMediaResolver::new(
            extractor_backend,
            ResolverConfig::default().allowed_hosts,
        ));
        resolver.probe().await;

        let state = Arc::new(transmux_server::state::AppState::new(
            config,
            Arc::clone(&orchestrator),
            resolver,
        ));

        let router = transmux_server::api::create_router(state);

        Self {
            router,
            engine,
            extractor,
            orchestrator,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    /// Send a multipart form upload.
    pub async fn post_multipart(
        &self,
        path: &str,
        files: &[FilePart<'_>],
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(files, fields)))
            .unwrap();
        self.send(request).await
    }

    /// Send an arbitrary request.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }
}

/// Assert the status of a [`TestResponse`], printing the body on mismatch.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "unexpected status, body: {}",
            String::from_utf8_lossy(&$response.bytes)
        )
    };
}
