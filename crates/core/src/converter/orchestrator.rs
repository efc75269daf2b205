//! Conversion job orchestration.
//!
//! A job walks the engine through write -> execute -> read with scratch names
//! unique to the job, and removes its scratch entries on every exit path.

use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::engine::TranscodeEngine;
use super::error::ConverterError;
use super::formats::{FormatRegistry, FormatSpec};
use super::session::EngineSession;
use super::types::{sanitize_filename_stem, ConversionRequest, ConversionResult, ProgressEvent};
use crate::metrics::{CONVERSIONS_TOTAL, CONVERSION_DURATION};

/// Input extension used when the source name carries none.
pub const DEFAULT_INPUT_EXTENSION: &str = "bin";

/// Stem used when the source name sanitizes to nothing.
pub const DEFAULT_OUTPUT_STEM: &str = "converted";

/// Turns raw engine percentages into monotonic progress events.
#[derive(Debug, Default)]
struct ProgressTracker {
    last: Option<u8>,
}

impl ProgressTracker {
    fn advance(&mut self, raw: f32) -> Option<ProgressEvent> {
        if !raw.is_finite() {
            return None;
        }
        let percent = raw.clamp(0.0, 100.0).round() as u8;
        if self.last.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last = Some(percent);
        Some(ProgressEvent { percent })
    }
}

/// Decrements the active job count when a job finishes, however it finishes.
struct ActiveJob<'a>(&'a AtomicUsize);

impl<'a> ActiveJob<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Drives conversions through a shared [`EngineSession`].
pub struct TranscodeOrchestrator {
    session: Arc<EngineSession>,
    registry: FormatRegistry,
    active_jobs: AtomicUsize,
}

impl TranscodeOrchestrator {
    pub fn new(session: Arc<EngineSession>) -> Self {
        Self {
            session,
            registry: FormatRegistry::new(),
            active_jobs: AtomicUsize::new(0),
        }
    }

    /// Wraps `engine` in a fresh session.
    pub fn with_engine(engine: Arc<dyn TranscodeEngine>) -> Self {
        Self::new(Arc::new(EngineSession::new(engine)))
    }

    pub fn session(&self) -> &Arc<EngineSession> {
        &self.session
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Number of conversions currently in progress.
    pub fn active_jobs(&self) -> usize {
        self.active_jobs.load(Ordering::Relaxed)
    }

    /// Converts `request` to its target format.
    ///
    /// Progress percentages are sent on `progress_tx` as they rise; a slow or
    /// closed receiver never stalls the job. Cancelling `cancel` stops the
    /// engine and fails the job with [`ConverterError::Cancelled`].
    pub async fn convert(
        &self,
        request: ConversionRequest,
        progress_tx: Option<mpsc::Sender<ProgressEvent>>,
        cancel: CancellationToken,
    ) -> Result<ConversionResult, ConverterError> {
        if request.source_bytes.is_empty() {
            return Err(ConverterError::invalid_input("source file is empty"));
        }

        let _active = ActiveJob::enter(&self.active_jobs);
        let job_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        info!(
            job_id = %job_id,
            source = %request.source_name,
            target = %request.target_format,
            size = request.source_bytes.len(),
            "Starting conversion"
        );

        let mut scratch = Vec::with_capacity(2);
        let outcome = self
            .run(&job_id, &request, &mut scratch, progress_tx, &cancel)
            .await;
        self.cleanup(&job_id, &scratch).await;

        let elapsed = start.elapsed();
        let format_label = self
            .registry
            .resolve(&request.target_format)
            .map(|spec| spec.token)
            .unwrap_or("unsupported");

        match outcome {
            Ok((bytes, spec)) => {
                CONVERSIONS_TOTAL
                    .with_label_values(&[format_label, "success"])
                    .inc();
                CONVERSION_DURATION
                    .with_label_values(&[format_label])
                    .observe(elapsed.as_secs_f64());

                let result = ConversionResult {
                    suggested_filename: suggested_filename(&request, spec),
                    mime_type: spec.mime_type.to_string(),
                    duration_ms: elapsed.as_millis() as u64,
                    job_id,
                    bytes,
                };

                info!(
                    job_id = %result.job_id,
                    format = spec.token,
                    duration_ms = result.duration_ms,
                    output_size = result.bytes.len(),
                    "Conversion completed"
                );

                Ok(result)
            }
            Err(e) => {
                let result_label = match &e {
                    ConverterError::Cancelled => "cancelled",
                    e if e.is_client_error() => "rejected",
                    _ => "failed",
                };
                CONVERSIONS_TOTAL
                    .with_label_values(&[format_label, result_label])
                    .inc();

                warn!(
                    job_id = %job_id,
                    target = %request.target_format,
                    duration_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Conversion failed"
                );

                Err(e)
            }
        }
    }

    async fn run(
        &self,
        job_id: &str,
        request: &ConversionRequest,
        scratch: &mut Vec<String>,
        progress_tx: Option<mpsc::Sender<ProgressEvent>>,
        cancel: &CancellationToken,
    ) -> Result<(Bytes, &'static FormatSpec), ConverterError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ConverterError::Cancelled),
            ready = self.session.ensure_ready() => ready?,
        }

        let engine = self.session.engine();

        let input_ext = request
            .source_extension()
            .unwrap_or_else(|| DEFAULT_INPUT_EXTENSION.to_string());
        let input_name = format!("{}-input.{}", job_id, input_ext);
        scratch.push(input_name.clone());
        engine
            .write(&input_name, request.source_bytes.clone())
            .await
            .map_err(|e| engine_failure(e, None))?;

        let spec = self.registry.resolve(&request.target_format)?;

        let output_name = format!("{}-output.{}", job_id, spec.extension());
        scratch.push(output_name.clone());

        let mut args = vec!["-i".to_string(), input_name];
        args.extend(spec.args());
        args.push(output_name.clone());

        if cancel.is_cancelled() {
            return Err(ConverterError::Cancelled);
        }

        debug!(job_id = %job_id, args = ?args, "Executing engine");
        let diagnostics = self
            .execute(engine, args, progress_tx, cancel)
            .await
            .map_err(|e| engine_failure(e, None))?;

        let bytes = match engine.read(&output_name).await {
            Ok(bytes) => bytes,
            Err(ConverterError::ScratchNotFound { .. }) => {
                return Err(ConverterError::execution_failed(
                    "engine produced no output",
                    diagnostics,
                ));
            }
            Err(e) => return Err(engine_failure(e, diagnostics)),
        };
        if bytes.is_empty() {
            return Err(ConverterError::execution_failed(
                "engine produced an empty output",
                diagnostics,
            ));
        }

        Ok((bytes, spec))
    }

    async fn execute(
        &self,
        engine: &dyn TranscodeEngine,
        args: Vec<String>,
        progress_tx: Option<mpsc::Sender<ProgressEvent>>,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ConverterError> {
        let (engine_tx, mut engine_rx) = mpsc::channel::<f32>(32);
        let mut tracker = ProgressTracker::default();

        let forward = |tracker: &mut ProgressTracker, raw: f32| {
            if let (Some(tx), Some(event)) = (progress_tx.as_ref(), tracker.advance(raw)) {
                let _ = tx.try_send(event);
            }
        };

        let execution = engine.execute(args, Some(engine_tx));
        tokio::pin!(execution);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(ConverterError::Cancelled),
                result = &mut execution => break result,
                Some(raw) = engine_rx.recv() => forward(&mut tracker, raw),
            }
        };

        if outcome.is_ok() {
            while let Ok(raw) = engine_rx.try_recv() {
                forward(&mut tracker, raw);
            }
        }

        outcome
    }

    async fn cleanup(&self, job_id: &str, names: &[String]) {
        let engine = self.session.engine();
        for name in names {
            if let Err(e) = engine.delete(name).await {
                warn!(job_id = %job_id, name = %name, error = %e, "Failed to remove scratch entry");
            }
        }
    }
}

/// Folds engine-side failures into [`ConverterError::TranscodeExecution`].
///
/// Cancellation and timeouts keep their own variants.
fn engine_failure(error: ConverterError, diagnostics: Option<String>) -> ConverterError {
    match error {
        ConverterError::Cancelled
        | ConverterError::Timeout { .. }
        | ConverterError::TranscodeExecution { .. } => error,
        other => ConverterError::execution_failed(other.to_string(), diagnostics),
    }
}

fn suggested_filename(request: &ConversionRequest, spec: &FormatSpec) -> String {
    let stem = sanitize_filename_stem(request.source_stem());
    let stem = if stem.is_empty() {
        DEFAULT_OUTPUT_STEM
    } else {
        stem.as_str()
    };
    format!("{}.{}", stem, spec.extension())
}
