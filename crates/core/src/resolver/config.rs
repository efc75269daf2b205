//! Configuration for the resolver module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::ExtractorBackend;

/// Configuration for remote media resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Extraction engine to use.
    #[serde(default)]
    pub backend: ExtractorBackend,

    /// Path to the yt-dlp binary.
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,

    /// Base URL of the extraction service (required for the `http` backend).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Timeout for a single extraction in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Hosts whose URLs are accepted.
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// Where downloads are staged before being streamed to the client.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_timeout() -> u64 {
    600
}

fn default_allowed_hosts() -> Vec<String> {
    [
        "youtube.com",
        "www.youtube.com",
        "m.youtube.com",
        "music.youtube.com",
        "youtu.be",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("transmux-downloads")
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            backend: ExtractorBackend::default(),
            ytdlp_path: default_ytdlp_path(),
            base_url: None,
            timeout_secs: default_timeout(),
            allowed_hosts: default_allowed_hosts(),
            scratch_dir: default_scratch_dir(),
        }
    }
}
