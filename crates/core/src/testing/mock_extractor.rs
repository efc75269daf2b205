//! Mock media extractor for testing.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::converter::FormatSpec;
use crate::resolver::{
    media_filename, MediaExtractor, RemoteMedia, RemoteVideoInfo, ResolverError, VideoUrl,
};

/// Mock implementation of the MediaExtractor trait.
///
/// Provides controllable behavior for testing:
/// - Track info and media requests for assertions
/// - Configure returned metadata and media bytes
/// - Simulate failures and an unreachable engine
#[derive(Debug, Clone)]
pub struct MockExtractor {
    /// Video ids passed to `fetch_info`.
    info_requests: Arc<RwLock<Vec<String>>>,
    /// (video id, format token) pairs passed to `fetch_media`.
    media_requests: Arc<RwLock<Vec<(String, String)>>>,
    /// Metadata returned by `fetch_info`; its title also names downloads.
    info: Arc<RwLock<RemoteVideoInfo>>,
    /// Body returned by `fetch_media`.
    media_bytes: Arc<RwLock<Bytes>>,
    /// Result of `probe`.
    available: Arc<RwLock<bool>>,
    /// If set, the next fetch will fail with this error.
    next_error: Arc<RwLock<Option<ResolverError>>>,
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExtractor {
    /// Create a new mock extractor.
    pub fn new() -> Self {
        Self {
            info_requests: Arc::new(RwLock::new(Vec::new())),
            media_requests: Arc::new(RwLock::new(Vec::new())),
            info: Arc::new(RwLock::new(super::fixtures::video_info("Mock Video"))),
            media_bytes: Arc::new(RwLock::new(Bytes::from_static(b"mock-media-bytes"))),
            available: Arc::new(RwLock::new(true)),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Get the video ids of all info requests.
    pub async fn info_requests(&self) -> Vec<String> {
        self.info_requests.read().await.clone()
    }

    /// Get all media requests as (video id, format token).
    pub async fn media_requests(&self) -> Vec<(String, String)> {
        self.media_requests.read().await.clone()
    }

    /// Set the metadata returned by `fetch_info`.
    pub async fn set_info(&self, info: RemoteVideoInfo) {
        *self.info.write().await = info;
    }

    /// Set the body returned by `fetch_media`.
    pub async fn set_media_bytes(&self, bytes: impl Into<Bytes>) {
        *self.media_bytes.write().await = bytes.into();
    }

    /// Set the result of `probe`.
    pub async fn set_available(&self, available: bool) {
        *self.available.write().await = available;
    }

    /// Configure the next fetch to fail with the given error.
    pub async fn set_next_error(&self, error: ResolverError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Option<ResolverError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl MediaExtractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self) -> bool {
        *self.available.read().await
    }

    async fn fetch_info(&self, url: &VideoUrl) -> Result<RemoteVideoInfo, ResolverError> {
        self.info_requests.write().await.push(url.video_id.clone());
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(self.info.read().await.clone())
    }

    async fn fetch_media(
        &self,
        url: &VideoUrl,
        spec: &'static FormatSpec,
    ) -> Result<RemoteMedia, ResolverError> {
        self.media_requests
            .write()
            .await
            .push((url.video_id.clone(), spec.token.to_string()));
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let bytes = self.media_bytes.read().await.clone();
        let title = self.info.read().await.title.clone();
        let content_length = Some(bytes.len() as u64);

        Ok(RemoteMedia {
            stream: futures::stream::iter(vec![Ok(bytes)]).boxed(),
            mime_type: spec.mime_type.to_string(),
            filename: media_filename(Some(&title), spec),
            content_length,
        })
    }
}
