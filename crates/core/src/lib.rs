pub mod config;
pub mod converter;
pub mod metrics;
pub mod resolver;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    ServerConfig,
};
pub use converter::{
    ConversionRequest, ConversionResult, ConverterConfig, ConverterError, EngineSession,
    FfmpegEngine, FormatRegistry, FormatSpec, MediaKind, ProgressEvent, SessionState,
    TranscodeEngine, TranscodeOrchestrator,
};
pub use resolver::{
    ExtractorBackend, MediaExtractor, RemoteMedia, RemoteMediaResolver, RemoteVideoInfo,
    ResolverConfig, ResolverError,
};
