//! Remote media resolution.
//!
//! Resolves a video page URL to metadata or to a downloadable byte stream in
//! a requested format, through one of the `MediaExtractor` backends:
//! a local `yt-dlp` binary or a separately deployed extraction service.

mod config;
mod error;
mod http;
mod types;
mod url;
mod ytdlp;

pub use config::ResolverConfig;
pub use error::{ResolverError, EXTRACTION_UNAVAILABLE_MESSAGE};
pub use http::HttpExtractor;
pub use types::{ExtractorBackend, MediaStream, RemoteMedia, RemoteVideoInfo};
pub use url::{extract_video_id, validate_url, VideoUrl};
pub use ytdlp::YtDlpExtractor;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::converter::{sanitize_filename_stem, FormatRegistry, FormatSpec};
use crate::metrics::{REMOTE_FETCHES_TOTAL, REMOTE_FETCH_DURATION};

/// Stem used when a video has no usable title.
const DEFAULT_MEDIA_STEM: &str = "video";

/// Trait for extraction engines.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Returns the name of this extractor.
    fn name(&self) -> &str;

    /// Checks whether the extraction engine can be used.
    async fn probe(&self) -> bool;

    /// Looks up metadata for a video.
    async fn fetch_info(&self, url: &VideoUrl) -> Result<RemoteVideoInfo, ResolverError>;

    /// Downloads a video converted to `spec`.
    async fn fetch_media(
        &self,
        url: &VideoUrl,
        spec: &'static FormatSpec,
    ) -> Result<RemoteMedia, ResolverError>;
}

/// Download file name for a video title: sanitized title plus the format extension.
pub fn media_filename(title: Option<&str>, spec: &FormatSpec) -> String {
    let stem = title
        .map(sanitize_filename_stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| DEFAULT_MEDIA_STEM.to_string());
    format!("{}.{}", stem, spec.extension())
}

/// Validates requests and dispatches them to the configured extractor.
pub struct RemoteMediaResolver {
    extractor: Option<Arc<dyn MediaExtractor>>,
    allowed_hosts: Vec<String>,
    available: AtomicBool,
    registry: FormatRegistry,
}

impl RemoteMediaResolver {
    /// Create a resolver. It is assumed available until [`probe`](Self::probe) says otherwise.
    pub fn new(extractor: Option<Arc<dyn MediaExtractor>>, allowed_hosts: Vec<String>) -> Self {
        let available = AtomicBool::new(extractor.is_some());
        Self {
            extractor,
            allowed_hosts,
            available,
            registry: FormatRegistry::new(),
        }
    }

    /// Build the resolver selected by `config.backend`.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let extractor: Option<Arc<dyn MediaExtractor>> = match config.backend {
            ExtractorBackend::YtDlp => Some(Arc::new(YtDlpExtractor::new(config.clone()))),
            ExtractorBackend::Http => {
                let base_url = config.base_url.as_deref().ok_or_else(|| {
                    ResolverError::InvalidInput(
                        "resolver.base_url is required for the http backend".to_string(),
                    )
                })?;
                Some(Arc::new(HttpExtractor::new(base_url, config.timeout_secs)?))
            }
            ExtractorBackend::Disabled => None,
        };
        Ok(Self::new(extractor, config.allowed_hosts.clone()))
    }

    /// Name of the active extractor, if any.
    pub fn backend_name(&self) -> Option<&str> {
        self.extractor.as_deref().map(|e| e.name())
    }

    /// Checks the extractor and records whether it can be used.
    pub async fn probe(&self) -> bool {
        let available = match &self.extractor {
            Some(extractor) => extractor.probe().await,
            None => false,
        };
        self.available.store(available, Ordering::Relaxed);

        if available {
            info!(backend = ?self.backend_name(), "Remote media extraction available");
        } else {
            warn!("Remote media extraction unavailable, video downloads will be refused");
        }
        available
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn extractor(&self) -> Result<&dyn MediaExtractor, ResolverError> {
        match &self.extractor {
            Some(extractor) if self.is_available() => Ok(extractor.as_ref()),
            _ => Err(ResolverError::unavailable()),
        }
    }

    /// Resolves video metadata.
    pub async fn fetch_info(&self, raw_url: &str) -> Result<RemoteVideoInfo, ResolverError> {
        let url = validate_url(raw_url, &self.allowed_hosts)?;
        let extractor = self.extractor()?;

        let start = Instant::now();
        let result = extractor.fetch_info(&url).await;
        record("info", start, &result);

        match &result {
            Ok(info) => info!(video_id = %url.video_id, title = %info.title, "Resolved video info"),
            Err(e) => warn!(video_id = %url.video_id, error = %e, "Video info lookup failed"),
        }
        result
    }

    /// Resolves a downloadable stream of the video in `target_format`.
    ///
    /// Audio formats select audio-only sources; video formats select audio
    /// and video. Image formats cannot be produced from a remote video.
    pub async fn fetch_media(
        &self,
        raw_url: &str,
        target_format: &str,
    ) -> Result<RemoteMedia, ResolverError> {
        let url = validate_url(raw_url, &self.allowed_hosts)?;
        let spec = self
            .registry
            .resolve(target_format)
            .map_err(|_| ResolverError::UnsupportedFormat(target_format.trim().to_string()))?;
        if spec.is_image() || spec.token == "gif" {
            return Err(ResolverError::UnsupportedFormat(spec.token.to_string()));
        }
        let extractor = self.extractor()?;

        let start = Instant::now();
        let result = extractor.fetch_media(&url, spec).await;
        record("media", start, &result);

        match &result {
            Ok(media) => info!(
                video_id = %url.video_id,
                format = spec.token,
                filename = %media.filename,
                "Resolved remote media"
            ),
            Err(e) => warn!(
                video_id = %url.video_id,
                format = spec.token,
                error = %e,
                "Remote media download failed"
            ),
        }
        result
    }
}

fn record<T>(operation: &str, start: Instant, result: &Result<T, ResolverError>) {
    let label = match result {
        Ok(_) => "success",
        Err(ResolverError::ExtractionUnavailable(_)) => "unavailable",
        Err(e) if e.is_client_error() => "rejected",
        Err(_) => "failed",
    };
    REMOTE_FETCHES_TOTAL
        .with_label_values(&[operation, label])
        .inc();
    REMOTE_FETCH_DURATION
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());
}
