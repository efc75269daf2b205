//! yt-dlp backed media extractor.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::ResolverConfig;
use super::error::ResolverError;
use super::types::{RemoteMedia, RemoteVideoInfo};
use super::url::VideoUrl;
use super::{media_filename, MediaExtractor};
use crate::converter::FormatSpec;

/// Print template emitted once the final file is in place.
const AFTER_MOVE_PRINT: &str = "after_move:%(.{title,filepath})j";

/// Runs the `yt-dlp` binary.
pub struct YtDlpExtractor {
    config: ResolverConfig,
}

#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    view_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DownloadedFile {
    title: Option<String>,
    filepath: PathBuf,
}

impl YtDlpExtractor {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Arguments for a metadata-only lookup.
    pub fn info_args(url: &str) -> Vec<String> {
        ["-J", "--skip-download", "--no-playlist", "--no-warnings", url]
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Arguments selecting and converting streams for `spec`.
    pub fn format_args(spec: &FormatSpec) -> Result<Vec<String>, ResolverError> {
        let args: Vec<&str> = if spec.is_audio() {
            // yt-dlp calls the ogg container by its codec name
            let audio_format = match spec.token {
                "ogg" => "vorbis",
                other => other,
            };
            vec![
                "-f",
                "bestaudio/best",
                "-x",
                "--audio-format",
                audio_format,
                "--audio-quality",
                "192K",
            ]
        } else if spec.is_video() {
            match spec.token {
                "mp4" | "webm" | "mkv" => vec![
                    "-f",
                    "bestvideo+bestaudio/best",
                    "--merge-output-format",
                    spec.token,
                ],
                "avi" | "mov" | "flv" => vec!["-f", "best", "--recode-video", spec.token],
                other => return Err(ResolverError::UnsupportedFormat(other.to_string())),
            }
        } else {
            return Err(ResolverError::UnsupportedFormat(spec.token.to_string()));
        };

        Ok(args.into_iter().map(String::from).collect())
    }

    /// Full download arguments writing to `output_template`.
    pub fn download_args(
        url: &str,
        spec: &FormatSpec,
        output_template: &Path,
    ) -> Result<Vec<String>, ResolverError> {
        let mut args: Vec<String> = [
            "--no-playlist",
            "--no-warnings",
            "--no-progress",
            "--print",
            AFTER_MOVE_PRINT,
            "-o",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.push(output_template.to_string_lossy().into_owned());
        args.extend(Self::format_args(spec)?);
        args.push(url.to_string());
        Ok(args)
    }

    async fn run(&self, args: &[String]) -> Result<Vec<u8>, ResolverError> {
        debug!("Running yt-dlp {:?}", args);

        let child = Command::new(&self.config.ytdlp_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ResolverError::unavailable()
                } else {
                    ResolverError::Io(e)
                }
            })?;

        let output = timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            ResolverError::Resolution(format!(
                "yt-dlp timed out after {} seconds",
                self.config.timeout_secs
            ))
        })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolverError::Resolution(last_error_line(&stderr)));
        }

        Ok(output.stdout)
    }

    /// Removes leftovers of a failed download.
    async fn remove_partial(&self, file_id: &str) {
        let mut entries = match tokio::fs::read_dir(&self.config.scratch_dir).await {
            Ok(entries) => entries,
            Err(_) => return,
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy().starts_with(file_id) {
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    warn!(path = %entry.path().display(), error = %e, "Failed to remove partial download");
                }
            }
        }
    }

    async fn download(
        &self,
        url: &VideoUrl,
        spec: &'static FormatSpec,
        file_id: &str,
    ) -> Result<RemoteMedia, ResolverError> {
        let template = self.config.scratch_dir.join(format!("{}.%(ext)s", file_id));
        let args = Self::download_args(url.as_str(), spec, &template)?;
        let stdout = self.run(&args).await?;

        let downloaded = parse_downloaded(&stdout)?;
        if !downloaded.filepath.starts_with(&self.config.scratch_dir) {
            return Err(ResolverError::Resolution(format!(
                "yt-dlp wrote outside the download directory: {}",
                downloaded.filepath.display()
            )));
        }

        let file = File::open(&downloaded.filepath).await?;
        let content_length = file.metadata().await.ok().map(|m| m.len());

        info!(
            video_id = %url.video_id,
            format = spec.token,
            size = ?content_length,
            "Remote media downloaded"
        );

        Ok(RemoteMedia {
            stream: ScratchFileStream::new(file, downloaded.filepath).boxed(),
            mime_type: spec.mime_type.to_string(),
            filename: media_filename(downloaded.title.as_deref(), spec),
            content_length,
        })
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn probe(&self) -> bool {
        let output = Command::new(&self.config.ytdlp_path)
            .arg("--version")
            .stdin(Stdio::null())
            .output();

        match timeout(Duration::from_secs(10), output).await {
            Ok(Ok(output)) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("yt-dlp available: {}", version.trim());
                true
            }
            Ok(Ok(output)) => {
                warn!("yt-dlp --version exited with code: {:?}", output.status.code());
                false
            }
            Ok(Err(e)) => {
                warn!(
                    "yt-dlp not usable at {}: {}",
                    self.config.ytdlp_path.display(),
                    e
                );
                false
            }
            Err(_) => {
                warn!("yt-dlp --version timed out");
                false
            }
        }
    }

    async fn fetch_info(&self, url: &VideoUrl) -> Result<RemoteVideoInfo, ResolverError> {
        let stdout = self.run(&Self::info_args(url.as_str())).await?;
        parse_info(&stdout)
    }

    async fn fetch_media(
        &self,
        url: &VideoUrl,
        spec: &'static FormatSpec,
    ) -> Result<RemoteMedia, ResolverError> {
        Self::format_args(spec)?;
        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;

        let file_id = Uuid::new_v4().to_string();
        let result = self.download(url, spec, &file_id).await;
        if result.is_err() {
            self.remove_partial(&file_id).await;
        }
        result
    }
}

fn parse_info(stdout: &[u8]) -> Result<RemoteVideoInfo, ResolverError> {
    let raw: YtDlpInfo = serde_json::from_slice(stdout)
        .map_err(|e| ResolverError::Resolution(format!("Failed to parse yt-dlp response: {}", e)))?;

    let defaults = RemoteVideoInfo::default();
    Ok(RemoteVideoInfo {
        title: raw.title.unwrap_or(defaults.title),
        duration_seconds: raw
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u64)
            .unwrap_or(0),
        thumbnail_url: raw.thumbnail.unwrap_or_default(),
        author: raw.uploader.or(raw.channel).unwrap_or(defaults.author),
        view_count: raw.view_count,
    })
}

fn parse_downloaded(stdout: &[u8]) -> Result<DownloadedFile, ResolverError> {
    let stdout = String::from_utf8_lossy(stdout);
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with('{'))
        .ok_or_else(|| ResolverError::Resolution("yt-dlp did not report an output file".to_string()))?;

    serde_json::from_str(line)
        .map_err(|e| ResolverError::Resolution(format!("Failed to parse yt-dlp output: {}", e)))
}

fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.strip_prefix("ERROR:").unwrap_or(line).trim().to_string())
        .unwrap_or_else(|| "yt-dlp failed".to_string())
}

/// Streams a downloaded file and deletes it once the stream is dropped.
struct ScratchFileStream {
    inner: ReaderStream<File>,
    path: PathBuf,
}

impl ScratchFileStream {
    fn new(file: File, path: PathBuf) -> Self {
        Self {
            inner: ReaderStream::new(file),
            path,
        }
    }
}

impl Stream for ScratchFileStream {
    type Item = Result<Bytes, ResolverError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner)
            .poll_next(cx)
            .map(|item| item.map(|chunk| chunk.map_err(ResolverError::Io)))
    }
}

impl Drop for ScratchFileStream {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove download");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::FormatRegistry;
    use tempfile::TempDir;

    fn spec(token: &str) -> &'static FormatSpec {
        FormatRegistry::new().resolve(token).unwrap()
    }

    #[test]
    fn test_info_args() {
        let args = YtDlpExtractor::info_args("https://youtu.be/abc");
        assert_eq!(
            args,
            vec!["-J", "--skip-download", "--no-playlist", "--no-warnings", "https://youtu.be/abc"]
        );
    }

    #[test]
    fn test_audio_format_args() {
        let args = YtDlpExtractor::format_args(spec("mp3")).unwrap();
        assert_eq!(
            args,
            vec!["-f", "bestaudio/best", "-x", "--audio-format", "mp3", "--audio-quality", "192K"]
        );

        let args = YtDlpExtractor::format_args(spec("ogg")).unwrap();
        assert!(args.contains(&"vorbis".to_string()));
    }

    #[test]
    fn test_video_format_args() {
        let args = YtDlpExtractor::format_args(spec("mp4")).unwrap();
        assert_eq!(
            args,
            vec!["-f", "bestvideo+bestaudio/best", "--merge-output-format", "mp4"]
        );

        let args = YtDlpExtractor::format_args(spec("avi")).unwrap();
        assert_eq!(args, vec!["-f", "best", "--recode-video", "avi"]);
    }

    #[test]
    fn test_image_and_gif_are_unsupported() {
        for token in ["png", "jpg", "gif", "wmv"] {
            assert!(
                matches!(
                    YtDlpExtractor::format_args(spec(token)),
                    Err(ResolverError::UnsupportedFormat(_))
                ),
                "{} should be unsupported",
                token
            );
        }
    }

    #[test]
    fn test_download_args_layout() {
        let args = YtDlpExtractor::download_args(
            "https://youtu.be/abc",
            spec("mp3"),
            Path::new("/tmp/dl/id.%(ext)s"),
        )
        .unwrap();

        assert_eq!(args.last().unwrap(), "https://youtu.be/abc");
        let print = args.iter().position(|a| a == "--print").unwrap();
        assert_eq!(args[print + 1], AFTER_MOVE_PRINT);
        let output = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[output + 1], "/tmp/dl/id.%(ext)s");
    }

    #[test]
    fn test_parse_info_defaults() {
        let info = parse_info(br#"{"id": "abc", "duration": 212.4, "view_count": 1000}"#).unwrap();
        assert_eq!(info.title, "Unknown");
        assert_eq!(info.author, "Unknown");
        assert_eq!(info.duration_seconds, 212);
        assert_eq!(info.thumbnail_url, "");
        assert_eq!(info.view_count, Some(1000));
    }

    #[test]
    fn test_parse_info_full() {
        let json = br#"{
            "title": "Never Gonna Give You Up",
            "duration": 213,
            "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
            "uploader": "Rick Astley",
            "channel": "RickAstleyVEVO"
        }"#;
        let info = parse_info(json).unwrap();
        assert_eq!(info.title, "Never Gonna Give You Up");
        assert_eq!(info.author, "Rick Astley");
        assert_eq!(info.duration_seconds, 213);
        assert!(info.view_count.is_none());
    }

    #[test]
    fn test_parse_info_garbage() {
        assert!(matches!(
            parse_info(b"not json"),
            Err(ResolverError::Resolution(_))
        ));
    }

    #[test]
    fn test_parse_downloaded_takes_last_json_line() {
        let stdout = b"[download] something\n{\"title\": \"Clip\", \"filepath\": \"/tmp/dl/x.mp3\"}\n";
        let downloaded = parse_downloaded(stdout).unwrap();
        assert_eq!(downloaded.title.as_deref(), Some("Clip"));
        assert_eq!(downloaded.filepath, PathBuf::from("/tmp/dl/x.mp3"));

        assert!(parse_downloaded(b"nothing useful").is_err());
    }

    #[test]
    fn test_last_error_line() {
        let stderr = "WARNING: foo\nERROR: [youtube] abc: Video unavailable\n\n";
        assert_eq!(last_error_line(stderr), "[youtube] abc: Video unavailable");
        assert_eq!(last_error_line(""), "yt-dlp failed");
    }

    #[tokio::test]
    async fn test_scratch_stream_deletes_file_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("media.mp3");
        tokio::fs::write(&path, b"0123456789").await.unwrap();

        let file = File::open(&path).await.unwrap();
        let mut stream = ScratchFileStream::new(file, path.clone());

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"0123456789");
        assert!(path.exists());

        drop(stream);
        assert!(!path.exists());
    }

    fn video_url() -> VideoUrl {
        crate::resolver::validate_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            &ResolverConfig::default().allowed_hosts,
        )
        .unwrap()
    }

    /// Extractor over a scripted yt-dlp. `body` runs with `$out` set to the
    /// `-o` template resolved for an mp3 download.
    #[cfg(unix)]
    fn scripted_extractor(dir: &TempDir, body: &str, timeout_secs: u64) -> YtDlpExtractor {
        let script = crate::testing::fixtures::shell_script(
            dir.path(),
            "yt-dlp",
            &format!(
                r#"while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then shift; tmpl="$1"; fi
  shift
done
out=$(echo "$tmpl" | sed 's/%(ext)s/mp3/')
{}"#,
                body
            ),
        );
        YtDlpExtractor::new(ResolverConfig {
            ytdlp_path: script,
            scratch_dir: dir.path().join("downloads"),
            timeout_secs,
            ..Default::default()
        })
    }

    #[cfg(unix)]
    async fn scratch_files(dir: &TempDir) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path().join("downloads")).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_streams_file_and_removes_it() {
        let dir = TempDir::new().unwrap();
        let extractor = scripted_extractor(
            &dir,
            r#"printf 'AUDIO' > "$out"
printf '{"title": "My Song", "filepath": "%s"}\n' "$out""#,
            30,
        );

        let mut media = extractor
            .fetch_media(&video_url(), spec("mp3"))
            .await
            .unwrap();

        assert_eq!(media.filename, "My Song.mp3");
        assert_eq!(media.mime_type, "audio/mpeg");
        assert_eq!(media.content_length, Some(5));
        assert_eq!(scratch_files(&dir).await.len(), 1);

        let mut body = Vec::new();
        while let Some(chunk) = media.stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(body, b"AUDIO");

        drop(media);
        assert!(scratch_files(&dir).await.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_download_reports_error_and_removes_partial() {
        let dir = TempDir::new().unwrap();
        let extractor = scripted_extractor(
            &dir,
            r#"printf 'half' > "$out.part"
echo "WARNING: unable to extract uploader" >&2
echo "ERROR: [youtube] dQw4w9WgXcQ: Video unavailable" >&2
exit 1"#,
            30,
        );

        let err = extractor
            .fetch_media(&video_url(), spec("mp3"))
            .await
            .unwrap_err();

        match err {
            ResolverError::Resolution(message) => {
                assert_eq!(message, "[youtube] dQw4w9WgXcQ: Video unavailable")
            }
            other => panic!("expected Resolution, got {:?}", other),
        }
        assert!(scratch_files(&dir).await.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_outside_scratch_dir_is_refused() {
        let dir = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let stray = elsewhere.path().join("stray.mp3");
        let extractor = scripted_extractor(
            &dir,
            &format!(
                r#"printf 'AUDIO' > "{path}"
printf '{{"title": "Stray", "filepath": "%s"}}\n' "{path}""#,
                path = stray.display()
            ),
            30,
        );

        let err = extractor
            .fetch_media(&video_url(), spec("mp3"))
            .await
            .err()
            .unwrap();

        assert!(
            matches!(&err, ResolverError::Resolution(message) if message.contains("outside")),
            "{:?}",
            err
        );
        assert!(scratch_files(&dir).await.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_timeout() {
        let dir = TempDir::new().unwrap();
        let extractor = scripted_extractor(&dir, "exec sleep 30", 1);

        let started = std::time::Instant::now();
        let err = extractor
            .fetch_media(&video_url(), spec("mp3"))
            .await
            .err()
            .unwrap();

        assert!(
            matches!(&err, ResolverError::Resolution(message) if message.contains("timed out")),
            "{:?}",
            err
        );
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let config = ResolverConfig {
            ytdlp_path: PathBuf::from("/nonexistent/yt-dlp"),
            scratch_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let extractor = YtDlpExtractor::new(config);
        assert!(!extractor.probe().await);

        let url = crate::resolver::validate_url(
            "https://youtu.be/abc",
            &ResolverConfig::default().allowed_hosts,
        )
        .unwrap();
        let err = extractor.fetch_info(&url).await.unwrap_err();
        assert!(matches!(err, ResolverError::ExtractionUnavailable(_)));
    }
}
