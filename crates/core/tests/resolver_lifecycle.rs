//! Remote media resolver integration tests.
//!
//! These tests run the resolver against the extraction service contract
//! (`/health`, `/api/info`, `/api/download`) served by wiremock.

use futures::TryStreamExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use transmux_core::{
    resolver::EXTRACTION_UNAVAILABLE_MESSAGE, ExtractorBackend, RemoteMediaResolver,
    ResolverConfig, ResolverError,
};

const VIDEO_URL: &str = "https://youtu.be/dQw4w9WgXcQ";

async fn http_resolver(server: &MockServer) -> RemoteMediaResolver {
    let config = ResolverConfig {
        backend: ExtractorBackend::Http,
        base_url: Some(server.uri()),
        timeout_secs: 5,
        ..Default::default()
    };
    let resolver = RemoteMediaResolver::from_config(&config).unwrap();
    resolver.probe().await;
    resolver
}

async fn mount_health(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ok"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_info_then_download() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": "Lofi Beats / Study Mix",
            "duration": 3600,
            "thumbnail": "",
            "author": "Lofi Girl"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "content-disposition",
                    r#"attachment; filename="Lofi Beats / Study Mix.m4a""#,
                )
                .set_body_bytes(vec![7u8; 4096]),
        )
        .mount(&server)
        .await;

    let resolver = http_resolver(&server).await;
    assert!(resolver.is_available());
    assert_eq!(resolver.backend_name(), Some("http"));

    let info = resolver.fetch_info(VIDEO_URL).await.unwrap();
    assert_eq!(info.title, "Lofi Beats / Study Mix");
    assert_eq!(info.duration_seconds, 3600);
    assert!(info.view_count.is_none());

    let media = resolver.fetch_media(VIDEO_URL, "m4a").await.unwrap();
    assert_eq!(media.mime_type, "audio/mp4");
    assert_eq!(media.filename, "Lofi Beats Study Mix.m4a");

    let chunks: Vec<bytes::Bytes> = media.stream.try_collect().await.unwrap();
    let total: usize = chunks.iter().map(|c| c.len()).sum();
    assert_eq!(total, 4096);
}

#[tokio::test]
async fn test_service_rejection_is_client_error() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "URL is required"
            })),
        )
        .mount(&server)
        .await;

    let resolver = http_resolver(&server).await;
    let err = resolver.fetch_media(VIDEO_URL, "mp4").await.unwrap_err();
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_invalid_url_never_reaches_service() {
    let server = MockServer::start().await;
    mount_health(&server).await;

    let resolver = http_resolver(&server).await;
    let err = resolver
        .fetch_media("https://example.com/watch?v=abc", "mp3")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolverError::InvalidUrl(_)));

    let received = server.received_requests().await.unwrap();
    assert!(received.iter().all(|r| r.url.path() == "/health"));
}

#[tokio::test]
async fn test_disabled_backend_explains_alternatives() {
    let config = ResolverConfig {
        backend: ExtractorBackend::Disabled,
        ..Default::default()
    };
    let resolver = RemoteMediaResolver::from_config(&config).unwrap();
    assert!(!resolver.probe().await);

    let err = resolver.fetch_media(VIDEO_URL, "mp3").await.unwrap_err();
    match err {
        ResolverError::ExtractionUnavailable(message) => {
            assert_eq!(message, EXTRACTION_UNAVAILABLE_MESSAGE)
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
