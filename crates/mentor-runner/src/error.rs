//! Error types for run orchestration.

use std::io;

use thiserror::Error;

/// Errors that can occur while starting or supervising a run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Failed to create a directory the run needs.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to persist the run's resume metadata.
    #[error("Failed to write run metadata to '{path}': {source}")]
    Metadata {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to open the run log.
    #[error("Failed to open run log '{path}': {source}")]
    LogOpen {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to spawn a subprocess.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A spawned process did not expose a piped stream.
    #[error("Failed to get {0} handle")]
    MissingPipe(&'static str),

    /// The run was cancelled before the trainer exited.
    #[error("Training was canceled.")]
    Cancelled,

    /// I/O error while waiting on the trainer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
