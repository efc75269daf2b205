//! Output format registry.
//!
//! Maps a requested output token (e.g. `"mp3"`, `"webm"`) to the media kind,
//! the engine arguments that produce it and the MIME type of the result.
//! Pure data: lookups have no side effects.

use serde::Serialize;

use super::error::ConverterError;

/// Broad category of an output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
    Image,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Image => "image",
        }
    }
}

/// Static descriptor of how to produce one output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatSpec {
    /// Canonical lowercase token, also used as the file extension.
    pub token: &'static str,
    /// Media kind of the output.
    pub kind: MediaKind,
    /// Engine arguments placed between the input and the output name.
    pub codec_args: &'static [&'static str],
    /// MIME type of the produced file.
    pub mime_type: &'static str,
}

impl FormatSpec {
    /// File extension for outputs of this format.
    pub fn extension(&self) -> &'static str {
        self.token
    }

    pub fn is_audio(&self) -> bool {
        self.kind == MediaKind::Audio
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    pub fn is_image(&self) -> bool {
        self.kind == MediaKind::Image
    }

    /// Owned copy of the codec arguments.
    pub fn args(&self) -> Vec<String> {
        self.codec_args.iter().map(|a| a.to_string()).collect()
    }
}

/// Re-mux without re-encoding.
const STREAM_COPY: &[&str] = &["-codec:v", "copy", "-codec:a", "copy"];

const FORMATS: &[FormatSpec] = &[
    // Audio
    FormatSpec {
        token: "mp3",
        kind: MediaKind::Audio,
        codec_args: &["-codec:a", "libmp3lame", "-b:a", "192k"],
        mime_type: "audio/mpeg",
    },
    FormatSpec {
        token: "wav",
        kind: MediaKind::Audio,
        codec_args: &["-codec:a", "pcm_s16le"],
        mime_type: "audio/wav",
    },
    FormatSpec {
        token: "ogg",
        kind: MediaKind::Audio,
        codec_args: &["-codec:a", "libvorbis", "-q:a", "5"],
        mime_type: "audio/ogg",
    },
    FormatSpec {
        token: "aac",
        kind: MediaKind::Audio,
        codec_args: &["-codec:a", "aac", "-b:a", "192k"],
        mime_type: "audio/aac",
    },
    FormatSpec {
        token: "flac",
        kind: MediaKind::Audio,
        codec_args: &["-codec:a", "flac"],
        mime_type: "audio/flac",
    },
    FormatSpec {
        token: "m4a",
        kind: MediaKind::Audio,
        codec_args: &["-codec:a", "aac", "-b:a", "192k"],
        mime_type: "audio/mp4",
    },
    // Video
    FormatSpec {
        token: "mp4",
        kind: MediaKind::Video,
        codec_args: &[
            "-codec:v", "libx264", "-preset", "medium", "-crf", "23", "-codec:a", "aac",
        ],
        mime_type: "video/mp4",
    },
    FormatSpec {
        token: "avi",
        kind: MediaKind::Video,
        codec_args: &["-codec:v", "mpeg4", "-q:v", "5", "-codec:a", "libmp3lame"],
        mime_type: "video/x-msvideo",
    },
    FormatSpec {
        token: "mov",
        kind: MediaKind::Video,
        codec_args: &["-codec:v", "libx264", "-codec:a", "aac"],
        mime_type: "video/quicktime",
    },
    FormatSpec {
        token: "webm",
        kind: MediaKind::Video,
        codec_args: &["-codec:v", "libvpx", "-codec:a", "libvorbis"],
        mime_type: "video/webm",
    },
    FormatSpec {
        token: "wmv",
        kind: MediaKind::Video,
        codec_args: STREAM_COPY,
        mime_type: "video/x-ms-wmv",
    },
    FormatSpec {
        token: "flv",
        kind: MediaKind::Video,
        codec_args: STREAM_COPY,
        mime_type: "video/x-flv",
    },
    FormatSpec {
        token: "mkv",
        kind: MediaKind::Video,
        codec_args: STREAM_COPY,
        mime_type: "video/x-matroska",
    },
    // GIF is a filter chain, not a codec pair
    FormatSpec {
        token: "gif",
        kind: MediaKind::Video,
        codec_args: &["-vf", "fps=10,scale=320:-1:flags=lanczos", "-loop", "0"],
        mime_type: "image/gif",
    },
    // Still images, single frame
    FormatSpec {
        token: "png",
        kind: MediaKind::Image,
        codec_args: &["-frames:v", "1"],
        mime_type: "image/png",
    },
    FormatSpec {
        token: "jpg",
        kind: MediaKind::Image,
        codec_args: &["-frames:v", "1", "-q:v", "2"],
        mime_type: "image/jpeg",
    },
    FormatSpec {
        token: "webp",
        kind: MediaKind::Image,
        codec_args: &["-frames:v", "1", "-quality", "95"],
        mime_type: "image/webp",
    },
    FormatSpec {
        token: "bmp",
        kind: MediaKind::Image,
        codec_args: &["-frames:v", "1"],
        mime_type: "image/bmp",
    },
];

/// Alternative spellings accepted on input.
const ALIASES: &[(&str, &str)] = &[("jpeg", "jpg")];

/// Lookup table of supported output formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatRegistry;

impl FormatRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Resolves a format token. Case-insensitive, surrounding whitespace ignored.
    pub fn resolve(&self, token: &str) -> Result<&'static FormatSpec, ConverterError> {
        let normalized = token.trim().to_ascii_lowercase();
        let canonical = ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, target)| *target)
            .unwrap_or(normalized.as_str());

        FORMATS
            .iter()
            .find(|spec| spec.token == canonical)
            .ok_or_else(|| ConverterError::unsupported_format(token.trim()))
    }

    /// Whether `token` resolves to a format.
    pub fn supports(&self, token: &str) -> bool {
        self.resolve(token).is_ok()
    }

    /// All registered formats, in catalog order.
    pub fn all(&self) -> &'static [FormatSpec] {
        FORMATS
    }

    /// Canonical tokens of the given media kind.
    pub fn tokens(&self, kind: MediaKind) -> Vec<&'static str> {
        FORMATS
            .iter()
            .filter(|spec| spec.kind == kind)
            .map(|spec| spec.token)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_case_insensitive() {
        let registry = FormatRegistry::new();
        for spec in registry.all() {
            let upper = spec.token.to_ascii_uppercase();
            assert_eq!(registry.resolve(&upper).unwrap(), spec);
            assert_eq!(registry.resolve(spec.token).unwrap(), spec);
        }
        assert_eq!(
            registry.resolve("MP3").unwrap(),
            registry.resolve("mp3").unwrap()
        );
    }

    #[test]
    fn test_resolve_trims_whitespace() {
        let registry = FormatRegistry::new();
        assert_eq!(registry.resolve("  webm\n").unwrap().token, "webm");
    }

    #[test]
    fn test_resolve_alias() {
        let registry = FormatRegistry::new();
        let spec = registry.resolve("JPEG").unwrap();
        assert_eq!(spec.token, "jpg");
        assert_eq!(spec.mime_type, "image/jpeg");
    }

    #[test]
    fn test_unsupported_tokens() {
        let registry = FormatRegistry::new();
        for token in ["xyz", "", "   ", "mp 3", "docx", "mp3x"] {
            match registry.resolve(token) {
                Err(ConverterError::UnsupportedFormat { .. }) => {}
                other => panic!("expected UnsupportedFormat for {:?}, got {:?}", token, other),
            }
        }
    }

    #[test]
    fn test_tokens_are_unique() {
        let registry = FormatRegistry::new();
        let mut tokens: Vec<_> = registry.all().iter().map(|s| s.token).collect();
        let before = tokens.len();
        tokens.sort();
        tokens.dedup();
        assert_eq!(before, tokens.len());
    }

    #[test]
    fn test_audio_entries() {
        let registry = FormatRegistry::new();
        let mp3 = registry.resolve("mp3").unwrap();
        assert!(mp3.is_audio());
        assert_eq!(mp3.mime_type, "audio/mpeg");
        assert_eq!(mp3.codec_args, &["-codec:a", "libmp3lame", "-b:a", "192k"]);

        let wav = registry.resolve("wav").unwrap();
        assert_eq!(wav.codec_args, &["-codec:a", "pcm_s16le"]);

        let flac = registry.resolve("flac").unwrap();
        assert!(!flac.codec_args.contains(&"-b:a"));

        assert_eq!(
            registry.tokens(MediaKind::Audio),
            vec!["mp3", "wav", "ogg", "aac", "flac", "m4a"]
        );
    }

    #[test]
    fn test_video_entries() {
        let registry = FormatRegistry::new();
        let mp4 = registry.resolve("mp4").unwrap();
        assert!(mp4.is_video());
        assert!(mp4.codec_args.contains(&"libx264"));
        assert!(mp4.codec_args.contains(&"-preset"));
        assert!(mp4.codec_args.contains(&"aac"));

        let mkv = registry.resolve("mkv").unwrap();
        assert_eq!(mkv.codec_args, STREAM_COPY);
    }

    #[test]
    fn test_gif_uses_filter_chain() {
        let registry = FormatRegistry::new();
        let gif = registry.resolve("gif").unwrap();
        assert_eq!(gif.mime_type, "image/gif");
        assert!(gif.codec_args.contains(&"-vf"));
        assert!(!gif.codec_args.contains(&"-codec:v"));
    }

    #[test]
    fn test_image_entries_are_single_frame() {
        let registry = FormatRegistry::new();
        for token in registry.tokens(MediaKind::Image) {
            let spec = registry.resolve(token).unwrap();
            assert!(spec.is_image());
            assert_eq!(&spec.codec_args[..2], &["-frames:v", "1"]);
            assert!(spec.mime_type.starts_with("image/"));
        }
    }
}
