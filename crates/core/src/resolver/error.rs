//! Error types for the resolver module.

use thiserror::Error;

/// Message shown when no extraction backend can serve the request.
pub const EXTRACTION_UNAVAILABLE_MESSAGE: &str = "Video download is not available on this server. \
Download the video yourself and convert it with the media converter, \
or deploy the extraction service and point resolver.base_url at it.";

/// Errors that can occur while resolving remote media.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Missing or malformed request fields.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// URL does not point at a supported video page.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The requested format cannot be produced from remote media.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// No extraction engine is reachable.
    #[error("{0}")]
    ExtractionUnavailable(String),

    /// The extraction engine ran but could not resolve the media.
    #[error("Could not resolve media: {0}")]
    Resolution(String),

    /// HTTP request to the extraction service failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error while handling downloaded media.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolverError {
    /// The standard "extraction unavailable" error.
    pub fn unavailable() -> Self {
        Self::ExtractionUnavailable(EXTRACTION_UNAVAILABLE_MESSAGE.to_string())
    }

    /// Whether the caller got the request wrong.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::InvalidUrl(_) | Self::UnsupportedFormat(_)
        )
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Io(_) => true,
            _ => false,
        }
    }
}
