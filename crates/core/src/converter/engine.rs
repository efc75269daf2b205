//! Trait definitions for the transcoding engine binding.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::error::ConverterError;

/// A transcoding engine driven with command-style arguments.
///
/// The engine owns a scratch filesystem addressed by plain file names. Jobs
/// write their input there, run [`execute`](TranscodeEngine::execute) with
/// arguments that reference those names, read the output back and delete
/// both entries.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// One-time initialization. Called through `EngineSession`, never directly by jobs.
    async fn load(&self) -> Result<(), ConverterError>;

    /// Stores `bytes` under `name` in the scratch filesystem.
    async fn write(&self, name: &str, bytes: Bytes) -> Result<(), ConverterError>;

    /// Reads the scratch entry `name`.
    async fn read(&self, name: &str) -> Result<Bytes, ConverterError>;

    /// Removes the scratch entry `name`. Removing a missing entry is not an error.
    async fn delete(&self, name: &str) -> Result<(), ConverterError>;

    /// Runs the engine, returning its trailing diagnostic output, if any.
    ///
    /// Percentages (0.0 - 100.0) are sent on `progress_tx` when the engine can
    /// estimate them. Completion is signalled by returning, not by reaching 100.
    /// A clean exit does not guarantee the output was written.
    async fn execute(
        &self,
        args: Vec<String>,
        progress_tx: Option<mpsc::Sender<f32>>,
    ) -> Result<Option<String>, ConverterError>;
}

/// Ensures a scratch name cannot escape the scratch filesystem.
pub fn validate_scratch_name(name: &str) -> Result<(), ConverterError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.starts_with('-');

    if valid {
        Ok(())
    } else {
        Err(ConverterError::invalid_input(format!(
            "invalid scratch name: {:?}",
            name
        )))
    }
}
