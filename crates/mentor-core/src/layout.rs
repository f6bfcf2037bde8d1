//! Filesystem layout of a results root.
//!
//! Every run owns `<results>/<run_id>/` and keeps its bookkeeping files in
//! `<results>/<run_id>/run_logs/`. These names are shared with the external
//! trainer and with previous service lifetimes, so they must not change.

use std::path::{Path, PathBuf};

use crate::ids::RunId;

/// Directory under a run directory holding logs and bookkeeping files.
pub const RUN_LOGS_DIR: &str = "run_logs";

/// Resume document written at start.
pub const METADATA_FILE: &str = "run_metadata.json";

/// Terminal status document written by the trainer.
pub const STATUS_FILE: &str = "training_status.json";

/// Interleaved subprocess output.
pub const SUPERVISOR_LOG_FILE: &str = "mentor-api.log";

/// Paths for runs stored under one results root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.root.join(run_id.as_str())
    }

    pub fn run_logs_dir(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join(RUN_LOGS_DIR)
    }

    pub fn metadata_path(&self, run_id: &RunId) -> PathBuf {
        self.run_logs_dir(run_id).join(METADATA_FILE)
    }

    pub fn status_path(&self, run_id: &RunId) -> PathBuf {
        self.run_logs_dir(run_id).join(STATUS_FILE)
    }

    pub fn log_path(&self, run_id: &RunId) -> PathBuf {
        self.run_logs_dir(run_id).join(SUPERVISOR_LOG_FILE)
    }
}

/// Make `path` absolute relative to the current working directory.
///
/// The path is not required to exist and is not canonicalized.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
