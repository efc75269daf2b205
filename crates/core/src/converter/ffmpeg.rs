//! FFmpeg-based engine implementation.

use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use super::config::ConverterConfig;
use super::engine::{validate_scratch_name, TranscodeEngine};
use super::error::ConverterError;

/// Number of stderr lines kept for error diagnostics.
const DIAGNOSTIC_LINES: usize = 20;

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Duration: (\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap());
static OUT_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^out_time_(?:us|ms)=(\d+)$").unwrap());
static PROGRESS_KV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_]+=\S*$").unwrap());

/// FFmpeg-based engine. The scratch filesystem is a private directory.
pub struct FfmpegEngine {
    config: ConverterConfig,
}

impl FfmpegEngine {
    /// Creates a new FFmpeg engine with the given configuration.
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    /// Directory backing the scratch filesystem.
    pub fn scratch_dir(&self) -> &Path {
        &self.config.scratch_dir
    }

    /// Names currently present in the scratch filesystem.
    pub async fn scratch_entries(&self) -> Result<Vec<String>, ConverterError> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.config.scratch_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry.file_name().to_string_lossy().to_string());
        }
        entries.sort();
        Ok(entries)
    }

    fn scratch_path(&self, name: &str) -> Result<PathBuf, ConverterError> {
        validate_scratch_name(name)?;
        Ok(self.config.scratch_dir.join(name))
    }

    /// Builds the full ffmpeg argument list around the job arguments.
    fn build_args(&self, job_args: &[String]) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-nostdin".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            // Progress output for parsing
            "-progress".to_string(),
            "pipe:2".to_string(),
            "-nostats".to_string(),
        ];

        args.extend(self.config.extra_ffmpeg_args.iter().cloned());
        args.extend(job_args.iter().cloned());

        args
    }
}

/// Turns ffmpeg's stderr into percentages.
#[derive(Debug, Default)]
struct ProgressParser {
    duration_secs: Option<f64>,
}

impl ProgressParser {
    /// Feeds one stderr line, returning a percentage when one can be computed.
    fn feed(&mut self, line: &str) -> Option<f32> {
        if self.duration_secs.is_none() {
            if let Some(secs) = parse_duration(line) {
                self.duration_secs = Some(secs);
                return None;
            }
        }

        let caps = OUT_TIME_RE.captures(line.trim())?;
        // Both keys are reported in microseconds
        let micros = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let duration = self.duration_secs.filter(|d| *d > 0.0)?;
        let current = micros / 1_000_000.0;
        Some((current / duration * 100.0).clamp(0.0, 100.0) as f32)
    }
}

/// Parses `Duration: HH:MM:SS.xx` from ffmpeg's input banner.
fn parse_duration(line: &str) -> Option<f64> {
    let caps = DURATION_RE.captures(line)?;
    let hours = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let minutes = caps.get(2)?.as_str().parse::<f64>().ok()?;
    let seconds = caps.get(3)?.as_str().parse::<f64>().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Whether a stderr line belongs to the `-progress` key/value stream.
fn is_progress_line(line: &str) -> bool {
    PROGRESS_KV_RE.is_match(line.trim())
}

/// Bounded tail of diagnostic lines.
#[derive(Debug)]
struct DiagnosticTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl DiagnosticTail {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, line: String) {
        if line.trim().is_empty() {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn into_output(self) -> Option<String> {
        if self.lines.is_empty() {
            None
        } else {
            Some(self.lines.into_iter().collect::<Vec<_>>().join("\n"))
        }
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn load(&self) -> Result<(), ConverterError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ConverterError::engine_load(format!(
                        "ffmpeg not found at path: {}",
                        self.config.ffmpeg_path.display()
                    ))
                } else {
                    ConverterError::engine_load(format!("failed to run ffmpeg: {}", e))
                }
            })?;

        if !output.status.success() {
            return Err(ConverterError::engine_load(format!(
                "ffmpeg -version exited with code: {:?}",
                output.status.code()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.lines().next().unwrap_or("unknown version");
        info!("Transcoding engine ready: {}", version);

        // Ensure scratch dir exists
        tokio::fs::create_dir_all(&self.config.scratch_dir)
            .await
            .map_err(|e| {
                ConverterError::engine_load(format!(
                    "failed to create scratch dir {}: {}",
                    self.config.scratch_dir.display(),
                    e
                ))
            })?;

        Ok(())
    }

    async fn write(&self, name: &str, bytes: Bytes) -> Result<(), ConverterError> {
        let path = self.scratch_path(name)?;
        tokio::fs::write(&path, &bytes).await?;
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Bytes, ConverterError> {
        let path = self.scratch_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConverterError::ScratchNotFound {
                    name: name.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), ConverterError> {
        let path = self.scratch_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn execute(
        &self,
        args: Vec<String>,
        progress_tx: Option<mpsc::Sender<f32>>,
    ) -> Result<Option<String>, ConverterError> {
        let full_args = self.build_args(&args);
        debug!("Running ffmpeg {:?}", full_args);

        // Scratch names are relative to the scratch dir
        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&full_args)
            .current_dir(&self.config.scratch_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ConverterError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    ConverterError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConverterError::execution_failed("ffmpeg stderr not captured", None))?;
        let mut reader = BufReader::new(stderr);

        let mut parser = ProgressParser::default();
        let mut diagnostics = DiagnosticTail::new(DIAGNOSTIC_LINES);

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            // Metadata tags are printed verbatim and need not be UTF-8
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Stopped reading ffmpeg stderr: {}", e);
                        break;
                    }
                }
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);

                if let Some(percent) = parser.feed(line) {
                    if let Some(ref tx) = progress_tx {
                        // Non-blocking send, a slow consumer just misses updates
                        let _ = tx.try_send(percent);
                    }
                } else if !is_progress_line(line) {
                    diagnostics.push(line.to_string());
                }
            }

            // Wait for process to complete
            child.wait().await
        })
        .await;

        match result {
            Ok(Ok(status)) if status.success() => Ok(diagnostics.into_output()),
            Ok(Ok(status)) => Err(ConverterError::execution_failed(
                format!("FFmpeg exited with code: {:?}", status.code()),
                diagnostics.into_output(),
            )),
            Ok(Err(e)) => Err(ConverterError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                let _ = child.kill().await;
                Err(ConverterError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
        }
    }
}
