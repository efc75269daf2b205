//! Guarded, lazily-initialized engine session.
//!
//! One `EngineSession` is created per process and shared by every job.
//! The underlying engine is loaded on first use; callers arriving while
//! the load is in flight wait for its outcome instead of starting another.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use super::engine::TranscodeEngine;
use super::error::ConverterError;
use crate::metrics::ENGINE_LOADS;

/// Lifecycle of the engine session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// Shared handle to a lazily loaded [`TranscodeEngine`].
pub struct EngineSession {
    engine: Arc<dyn TranscodeEngine>,
    state: watch::Sender<SessionState>,
}

/// Puts the session back to `Unloaded` if a load is abandoned midway.
struct LoadGuard<'a> {
    state: &'a watch::Sender<SessionState>,
    armed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_replace(SessionState::Unloaded);
        }
    }
}

impl EngineSession {
    pub fn new(engine: Arc<dyn TranscodeEngine>) -> Self {
        let (state, _) = watch::channel(SessionState::Unloaded);
        Self { engine, state }
    }

    /// The wrapped engine. Only valid for job use after `ensure_ready` succeeded.
    pub fn engine(&self) -> &dyn TranscodeEngine {
        self.engine.as_ref()
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Makes sure the engine is loaded.
    ///
    /// Returns immediately when ready. Otherwise either performs the load or
    /// waits for the in-flight one. A failed load is reported to every caller
    /// that waited on it; the next fresh call tries again.
    pub async fn ensure_ready(&self) -> Result<(), ConverterError> {
        loop {
            let mut claimed = false;
            self.state.send_if_modified(|state| match state {
                SessionState::Unloaded | SessionState::Failed(_) => {
                    *state = SessionState::Loading;
                    claimed = true;
                    true
                }
                SessionState::Loading | SessionState::Ready => false,
            });

            if claimed {
                return self.load().await;
            }

            let mut rx = self.state.subscribe();
            let settled = rx
                .wait_for(|state| *state != SessionState::Loading)
                .await
                .map_err(|_| ConverterError::engine_load("engine session closed"))?
                .clone();

            match settled {
                SessionState::Ready => return Ok(()),
                SessionState::Failed(reason) => return Err(ConverterError::engine_load(reason)),
                // The loader was dropped before finishing, try to claim it ourselves
                SessionState::Unloaded | SessionState::Loading => continue,
            }
        }
    }

    async fn load(&self) -> Result<(), ConverterError> {
        let mut guard = LoadGuard {
            state: &self.state,
            armed: true,
        };

        info!(engine = self.engine.name(), "Loading transcoding engine");
        let result = self.engine.load().await;
        guard.armed = false;

        match result {
            Ok(()) => {
                self.state.send_replace(SessionState::Ready);
                ENGINE_LOADS.with_label_values(&["success"]).inc();
                info!(engine = self.engine.name(), "Transcoding engine loaded");
                Ok(())
            }
            Err(e) => {
                let reason = match e {
                    ConverterError::EngineLoad { reason } => reason,
                    other => other.to_string(),
                };
                self.state
                    .send_replace(SessionState::Failed(reason.clone()));
                ENGINE_LOADS.with_label_values(&["failure"]).inc();
                error!(engine = self.engine.name(), "Transcoding engine failed to load: {}", reason);
                Err(ConverterError::engine_load(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngine;
    use std::time::Duration;

    fn session_with(engine: &MockEngine) -> Arc<EngineSession> {
        Arc::new(EngineSession::new(Arc::new(engine.clone())))
    }

    #[tokio::test]
    async fn test_starts_unloaded() {
        let engine = MockEngine::new();
        let session = session_with(&engine);
        assert_eq!(session.state(), SessionState::Unloaded);
        assert_eq!(engine.load_count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_ready_is_idempotent() {
        let engine = MockEngine::new();
        let session = session_with(&engine);

        session.ensure_ready().await.unwrap();
        session.ensure_ready().await.unwrap();
        session.ensure_ready().await.unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(engine.load_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_load() {
        let engine = MockEngine::new();
        engine.set_load_delay(Duration::from_millis(50)).await;
        let session = session_with(&engine);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.ensure_ready().await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(engine.load_count(), 1);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_waiters_see_load_failure() {
        let engine = MockEngine::new();
        engine.set_load_delay(Duration::from_millis(50)).await;
        engine.set_load_error(Some("wasm core unavailable".to_string())).await;
        let session = session_with(&engine);

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.ensure_ready().await })
            })
            .collect();

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            match err {
                ConverterError::EngineLoad { reason } => {
                    assert!(reason.contains("wasm core unavailable"))
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(engine.load_count(), 1);
        assert_eq!(
            session.state(),
            SessionState::Failed("wasm core unavailable".to_string())
        );
    }

    #[tokio::test]
    async fn test_fresh_call_retries_after_failure() {
        let engine = MockEngine::new();
        engine.set_load_error(Some("boom".to_string())).await;
        let session = session_with(&engine);

        assert!(session.ensure_ready().await.is_err());

        engine.set_load_error(None).await;
        session.ensure_ready().await.unwrap();

        assert_eq!(engine.load_count(), 2);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_abandoned_load_resets_state() {
        let engine = MockEngine::new();
        engine.set_load_delay(Duration::from_secs(5)).await;
        let session = session_with(&engine);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), session.ensure_ready()).await;
        assert!(abandoned.is_err());
        assert_eq!(session.state(), SessionState::Unloaded);

        engine.set_load_delay(Duration::ZERO).await;
        session.ensure_ready().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(SessionState::Unloaded.as_str(), "unloaded");
        assert_eq!(SessionState::Failed("x".into()).as_str(), "failed");
    }
}
