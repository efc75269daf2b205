//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while converting media.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// The request itself is malformed (empty upload, bad scratch name, ...).
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Requested output format has no registry entry.
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// The transcoding engine could not be initialized.
    #[error("Transcoding engine failed to load: {reason}")]
    EngineLoad { reason: String },

    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// The engine ran but the job failed.
    #[error("Conversion failed: {reason}")]
    TranscodeExecution {
        reason: String,
        stderr: Option<String>,
    },

    /// Conversion timed out.
    #[error("Conversion timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Scratch entry does not exist in the engine's filesystem.
    #[error("Scratch file not found: {name}")]
    ScratchNotFound { name: String },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Job was cancelled.
    #[error("Conversion cancelled")]
    Cancelled,
}

impl ConverterError {
    /// Creates a new invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates a new unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates a new engine load error.
    pub fn engine_load(reason: impl Into<String>) -> Self {
        Self::EngineLoad {
            reason: reason.into(),
        }
    }

    /// Creates a new execution error with the engine's diagnostic output.
    pub fn execution_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::TranscodeExecution {
            reason: reason.into(),
            stderr,
        }
    }

    /// Whether the caller got the request wrong (as opposed to the service failing).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::UnsupportedFormat { .. }
        )
    }

    /// Whether submitting a fresh request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EngineLoad { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }

    /// Message shown to end users, including the engine diagnostic when present.
    pub fn user_message(&self) -> String {
        match self {
            Self::TranscodeExecution {
                reason,
                stderr: Some(stderr),
            } if !stderr.trim().is_empty() => {
                format!("Conversion failed: {}: {}", reason, stderr.trim())
            }
            other => other.to_string(),
        }
    }
}
