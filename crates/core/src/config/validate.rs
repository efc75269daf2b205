use super::{types::Config, ConfigError};
use crate::resolver::ExtractorBackend;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Converter and resolver timeouts are positive
/// - The http resolver backend has a base URL
/// - At least one host is allowed for remote media
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.converter.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "converter.timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.resolver.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "resolver.timeout_secs must be greater than 0".to_string(),
        ));
    }

    if config.resolver.backend == ExtractorBackend::Http
        && config
            .resolver
            .base_url
            .as_deref()
            .is_none_or(|url| url.trim().is_empty())
    {
        return Err(ConfigError::ValidationError(
            "resolver.base_url is required when resolver.backend = \"http\"".to_string(),
        ));
    }

    if config.resolver.allowed_hosts.is_empty() {
        return Err(ConfigError::ValidationError(
            "resolver.allowed_hosts cannot be empty".to_string(),
        ));
    }

    Ok(())
}
