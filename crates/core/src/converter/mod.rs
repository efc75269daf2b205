//! Converter module for transcoding media files.
//!
//! This module provides the format catalog, the `TranscodeEngine` binding and
//! the orchestrator that runs conversion jobs through a shared engine session.
//!
//! # Features
//!
//! - Audio transcoding (MP3, WAV, OGG, AAC, FLAC, M4A)
//! - Video transcoding (MP4, AVI, MOV, WebM, stream-copy into WMV/FLV/MKV, GIF)
//! - Single-frame image output (PNG, JPEG, WebP, BMP)
//! - Progress reporting and cancellation
//!
//! # Example
//!
//! ```ignore
//! use transmux_core::converter::{ConversionRequest, FfmpegEngine, TranscodeOrchestrator};
//!
//! let orchestrator = TranscodeOrchestrator::with_engine(Arc::new(FfmpegEngine::with_defaults()));
//!
//! let request = ConversionRequest::new(wav_bytes, "tone.wav", "mp3");
//! let (tx, mut rx) = mpsc::channel(16);
//! let result = orchestrator.convert(request, Some(tx), CancellationToken::new()).await?;
//!
//! assert_eq!(result.mime_type, "audio/mpeg");
//! assert_eq!(result.suggested_filename, "tone.mp3");
//! ```

mod config;
mod engine;
mod error;
mod ffmpeg;
mod formats;
mod orchestrator;
mod session;
mod types;

pub use config::ConverterConfig;
pub use engine::{validate_scratch_name, TranscodeEngine};
pub use error::ConverterError;
pub use ffmpeg::FfmpegEngine;
pub use formats::{FormatRegistry, FormatSpec, MediaKind};
pub use orchestrator::{TranscodeOrchestrator, DEFAULT_INPUT_EXTENSION, DEFAULT_OUTPUT_STEM};
pub use session::{EngineSession, SessionState};
pub use types::{sanitize_filename_stem, ConversionRequest, ConversionResult, ProgressEvent};
