//! Types for the resolver module.

use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::error::ResolverError;

/// Metadata for a remote video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteVideoInfo {
    pub title: String,
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
}

impl Default for RemoteVideoInfo {
    fn default() -> Self {
        Self {
            title: "Unknown".to_string(),
            duration_seconds: 0,
            thumbnail_url: String::new(),
            author: "Unknown".to_string(),
            view_count: None,
        }
    }
}

/// Byte stream of resolved media.
pub type MediaStream = BoxStream<'static, Result<Bytes, ResolverError>>;

/// Downloadable media produced by an extractor.
pub struct RemoteMedia {
    pub stream: MediaStream,
    pub mime_type: String,
    pub filename: String,
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for RemoteMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteMedia")
            .field("mime_type", &self.mime_type)
            .field("filename", &self.filename)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Which extraction engine backs the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorBackend {
    /// Local `yt-dlp` binary.
    #[default]
    YtDlp,
    /// Separately deployed extraction service.
    Http,
    /// No extraction; every call fails as unavailable.
    Disabled,
}

impl ExtractorBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YtDlp => "yt_dlp",
            Self::Http => "http",
            Self::Disabled => "disabled",
        }
    }
}
