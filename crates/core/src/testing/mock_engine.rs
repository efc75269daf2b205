//! Mock transcoding engine for testing.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::converter::{validate_scratch_name, ConverterError, TranscodeEngine};

/// Mock implementation of the TranscodeEngine trait.
///
/// Keeps its scratch filesystem in memory and "transcodes" by tagging the
/// input bytes with the output extension, so concurrent jobs can be told
/// apart by their output:
/// - Track loads and executed argument lists for assertions
/// - Simulate slow or failing loads
/// - Simulate execution failures and long-running jobs
/// - Emit scripted progress percentages
///
/// # Example
///
/// ```rust,ignore
/// use transmux_core::testing::MockEngine;
///
/// let engine = MockEngine::new();
/// engine.set_progress_steps(vec![10.0, 50.0]).await;
///
/// let orchestrator = TranscodeOrchestrator::with_engine(Arc::new(engine.clone()));
/// // ... convert ...
///
/// assert_eq!(engine.load_count(), 1);
/// assert!(engine.file_names().await.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct MockEngine {
    /// In-memory scratch filesystem.
    files: Arc<RwLock<HashMap<String, Bytes>>>,
    /// Argument lists passed to `execute`.
    executions: Arc<RwLock<Vec<Vec<String>>>>,
    /// Number of `load` calls.
    loads: Arc<AtomicUsize>,
    /// Simulated load duration.
    load_delay: Arc<RwLock<Duration>>,
    /// While set, every load fails with this reason.
    load_error: Arc<RwLock<Option<String>>>,
    /// If set, the next execution will fail with this error.
    next_execute_error: Arc<RwLock<Option<ConverterError>>>,
    /// If set, the next execution exits cleanly without writing its output
    /// and reports this diagnostic.
    next_missing_output: Arc<RwLock<Option<String>>>,
    /// Simulated execution duration.
    execute_delay: Arc<RwLock<Duration>>,
    /// Percentages reported during each execution.
    progress_steps: Arc<RwLock<Vec<f32>>>,
    /// Whether `delete` fails.
    fail_deletes: Arc<RwLock<bool>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine.
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
            executions: Arc::new(RwLock::new(Vec::new())),
            loads: Arc::new(AtomicUsize::new(0)),
            load_delay: Arc::new(RwLock::new(Duration::ZERO)),
            load_error: Arc::new(RwLock::new(None)),
            next_execute_error: Arc::new(RwLock::new(None)),
            next_missing_output: Arc::new(RwLock::new(None)),
            execute_delay: Arc::new(RwLock::new(Duration::ZERO)),
            progress_steps: Arc::new(RwLock::new(vec![25.0, 50.0, 75.0])),
            fail_deletes: Arc::new(RwLock::new(false)),
        }
    }

    /// Output the mock produces for `input` converted to `extension`.
    pub fn expected_output(extension: &str, input: &[u8]) -> Vec<u8> {
        let mut output = format!("[{}]", extension).into_bytes();
        output.extend_from_slice(input);
        output
    }

    /// Number of times `load` was called.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Names currently present in the scratch filesystem, sorted.
    pub async fn file_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.files.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get all executed argument lists.
    pub async fn executions(&self) -> Vec<Vec<String>> {
        self.executions.read().await.clone()
    }

    /// Set the simulated load duration.
    pub async fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.write().await = delay;
    }

    /// Make loads fail with `reason` until cleared with `None`.
    pub async fn set_load_error(&self, reason: Option<String>) {
        *self.load_error.write().await = reason;
    }

    /// Configure the next execution to fail with the given error.
    pub async fn set_next_execute_error(&self, error: ConverterError) {
        *self.next_execute_error.write().await = Some(error);
    }

    /// Make the next execution succeed without producing any output.
    pub async fn set_next_missing_output(&self, diagnostic: impl Into<String>) {
        *self.next_missing_output.write().await = Some(diagnostic.into());
    }

    /// Set the simulated execution duration.
    pub async fn set_execute_delay(&self, delay: Duration) {
        *self.execute_delay.write().await = delay;
    }

    /// Set the percentages reported by each execution.
    pub async fn set_progress_steps(&self, steps: Vec<f32>) {
        *self.progress_steps.write().await = steps;
    }

    /// Make every `delete` fail.
    pub async fn set_fail_deletes(&self, fail: bool) {
        *self.fail_deletes.write().await = fail;
    }
}

#[async_trait]
impl TranscodeEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load(&self) -> Result<(), ConverterError> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        let delay = *self.load_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.load_error.read().await.clone() {
            Some(reason) => Err(ConverterError::engine_load(reason)),
            None => Ok(()),
        }
    }

    async fn write(&self, name: &str, bytes: Bytes) -> Result<(), ConverterError> {
        validate_scratch_name(name)?;
        self.files.write().await.insert(name.to_string(), bytes);
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Bytes, ConverterError> {
        validate_scratch_name(name)?;
        self.files
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ConverterError::ScratchNotFound {
                name: name.to_string(),
            })
    }

    async fn delete(&self, name: &str) -> Result<(), ConverterError> {
        validate_scratch_name(name)?;
        if *self.fail_deletes.read().await {
            return Err(ConverterError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "mock delete failure",
            )));
        }
        self.files.write().await.remove(name);
        Ok(())
    }

    async fn execute(
        &self,
        args: Vec<String>,
        progress_tx: Option<mpsc::Sender<f32>>,
    ) -> Result<Option<String>, ConverterError> {
        self.executions.write().await.push(args.clone());

        if let Some(err) = self.next_execute_error.write().await.take() {
            return Err(err);
        }

        let input = args
            .iter()
            .position(|arg| arg == "-i")
            .and_then(|i| args.get(i + 1))
            .ok_or_else(|| ConverterError::execution_failed("no input given", None))?;
        let output = args
            .last()
            .filter(|last| *last != input)
            .ok_or_else(|| ConverterError::execution_failed("no output given", None))?;

        let source = self.read(input).await.map_err(|_| {
            ConverterError::execution_failed(
                format!("{}: No such file or directory", input),
                None,
            )
        })?;

        let steps = self.progress_steps.read().await.clone();
        if let Some(tx) = progress_tx {
            for step in steps {
                let _ = tx.send(step).await;
            }
        }

        let delay = *self.execute_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(diagnostic) = self.next_missing_output.write().await.take() {
            return Ok(Some(diagnostic));
        }

        let extension = output.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        let converted = Self::expected_output(extension, &source);
        self.write(output, Bytes::from(converted)).await?;
        Ok(None)
    }
}
