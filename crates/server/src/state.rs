use std::sync::Arc;
use transmux_core::{Config, RemoteMediaResolver, SanitizedConfig, TranscodeOrchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<TranscodeOrchestrator>,
    resolver: Arc<RemoteMediaResolver>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<TranscodeOrchestrator>,
        resolver: Arc<RemoteMediaResolver>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            resolver,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Conversion orchestrator, shared with spawned conversion tasks.
    pub fn orchestrator(&self) -> &Arc<TranscodeOrchestrator> {
        &self.orchestrator
    }

    pub fn resolver(&self) -> &RemoteMediaResolver {
        &self.resolver
    }
}
