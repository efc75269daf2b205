use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::converter::ConverterConfig;
use crate::resolver::ResolverConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted upload body in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    512 * 1024 * 1024 // 512 MiB
}

/// Sanitized config for API responses (paths and service URLs withheld)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub converter: SanitizedConverterConfig,
    pub resolver: SanitizedResolverConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConverterConfig {
    pub timeout_secs: u64,
    pub ffmpeg_log_level: String,
}

/// Sanitized resolver config (base URL may carry credentials)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedResolverConfig {
    pub backend: String,
    pub base_url_configured: bool,
    pub timeout_secs: u64,
    pub allowed_hosts: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            converter: SanitizedConverterConfig {
                timeout_secs: config.converter.timeout_secs,
                ffmpeg_log_level: config.converter.ffmpeg_log_level.clone(),
            },
            resolver: SanitizedResolverConfig {
                backend: config.resolver.backend.as_str().to_string(),
                base_url_configured: config.resolver.base_url.is_some(),
                timeout_secs: config.resolver.timeout_secs,
                allowed_hosts: config.resolver.allowed_hosts.clone(),
            },
        }
    }
}
