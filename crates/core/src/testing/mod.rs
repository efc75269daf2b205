//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the engine and extractor
//! traits, allowing conversion and download flows to be tested without
//! ffmpeg or yt-dlp installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use transmux_core::testing::{MockEngine, MockExtractor};
//!
//! let engine = MockEngine::new();
//! let extractor = MockExtractor::new();
//!
//! // Configure mock behavior
//! engine.set_progress_steps(vec![10.0, 90.0]).await;
//! extractor.set_available(false).await;
//!
//! // Use in AppState...
//! ```

mod mock_engine;
mod mock_extractor;

pub use mock_engine::MockEngine;
pub use mock_extractor::MockExtractor;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::resolver::RemoteVideoInfo;

    /// Create test video metadata with reasonable defaults.
    pub fn video_info(title: &str) -> RemoteVideoInfo {
        RemoteVideoInfo {
            title: title.to_string(),
            duration_seconds: 212,
            thumbnail_url: "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg".to_string(),
            author: "Mock Channel".to_string(),
            view_count: Some(1_000),
        }
    }

    /// A minimal but valid PCM WAV file: `seconds` of silence, 8 kHz mono 16-bit.
    pub fn wav_silence(seconds: u32) -> Vec<u8> {
        const SAMPLE_RATE: u32 = 8_000;
        const BYTES_PER_SAMPLE: u32 = 2;

        let data_len = SAMPLE_RATE * BYTES_PER_SAMPLE * seconds;
        let mut wav = Vec::with_capacity(44 + data_len as usize);

        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&1u16.to_le_bytes()); // mono
        wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        wav.extend_from_slice(&(SAMPLE_RATE * BYTES_PER_SAMPLE).to_le_bytes());
        wav.extend_from_slice(&(BYTES_PER_SAMPLE as u16).to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());

        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        wav.resize(44 + data_len as usize, 0);
        wav
    }

    /// Write an executable `sh` script named `name` into `dir`.
    ///
    /// Stands in for ffmpeg or yt-dlp when a test needs the real process path.
    #[cfg(unix)]
    pub fn shell_script(
        dir: &std::path::Path,
        name: &str,
        body: &str,
    ) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

}
