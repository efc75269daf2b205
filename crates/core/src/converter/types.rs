//! Types for the converter module.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A media conversion request.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Raw bytes of the uploaded file.
    pub source_bytes: Bytes,
    /// Original file name; only its extension and stem are used.
    pub source_name: String,
    /// Requested output format token.
    pub target_format: String,
}

impl ConversionRequest {
    pub fn new(
        source_bytes: impl Into<Bytes>,
        source_name: impl Into<String>,
        target_format: impl Into<String>,
    ) -> Self {
        Self {
            source_bytes: source_bytes.into(),
            source_name: source_name.into(),
            target_format: target_format.into(),
        }
    }

    /// Lowercased extension of the source file, if it has a usable one.
    pub fn source_extension(&self) -> Option<String> {
        let (stem, ext) = self.source_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Source file name without directory components or extension.
    pub fn source_stem(&self) -> &str {
        let name = self
            .source_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.source_name);
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        }
    }
}

/// Output of a successful conversion. Owned by the caller.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// Job ID used for the scratch names.
    pub job_id: String,
    /// Converted bytes.
    pub bytes: Bytes,
    /// MIME type of the output format.
    pub mime_type: String,
    /// File name suggested to the downloader.
    pub suggested_filename: String,
    /// Wall-clock duration of the conversion in milliseconds.
    pub duration_ms: u64,
}

/// Progress update during conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Progress percentage (0 - 100).
    pub percent: u8,
}

/// Removes everything outside word characters, whitespace and hyphens.
pub fn sanitize_filename_stem(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_extension() {
        let req = ConversionRequest::new(vec![1u8], "Song.WAV", "mp3");
        assert_eq!(req.source_extension().as_deref(), Some("wav"));

        let req = ConversionRequest::new(vec![1u8], "noext", "mp3");
        assert_eq!(req.source_extension(), None);

        let req = ConversionRequest::new(vec![1u8], ".hidden", "mp3");
        assert_eq!(req.source_extension(), None);

        let req = ConversionRequest::new(vec![1u8], "archive.tar/gz", "mp3");
        assert_eq!(req.source_extension(), None);
    }

    #[test]
    fn test_source_stem() {
        let req = ConversionRequest::new(vec![1u8], "my track.final.wav", "mp3");
        assert_eq!(req.source_stem(), "my track.final");

        let req = ConversionRequest::new(vec![1u8], "C:\\music\\intro.flac", "mp3");
        assert_eq!(req.source_stem(), "intro");

        let req = ConversionRequest::new(vec![1u8], "plain", "mp3");
        assert_eq!(req.source_stem(), "plain");
    }

    #[test]
    fn test_sanitize_filename_stem() {
        assert_eq!(
            sanitize_filename_stem("Rick Astley - Never Gonna Give You Up (Official Video)"),
            "Rick Astley - Never Gonna Give You Up Official Video"
        );
        assert_eq!(sanitize_filename_stem("a/b\\c:d*e?\"f\""), "abcdef");
        assert_eq!(sanitize_filename_stem("  spaced   out  "), "spaced out");
        assert_eq!(sanitize_filename_stem("???"), "");
    }
}
