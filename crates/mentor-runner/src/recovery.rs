//! Startup recovery of runs left unfinished by a previous service lifetime.

use std::fs;
use std::path::{Path, PathBuf};

use mentor_core::{RunId, RunLayout, RunStatus};
use tracing::{info, warn};

use crate::metadata::RunMetadata;
use crate::payload::read_reported_status;
use crate::registry::{RunRegistry, StartResult};

/// Which unfinished runs may be resumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Required extension of the recorded environment executable, without
    /// the dot. `None` accepts any existing file.
    pub executable_extension: Option<String>,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            executable_extension: Some("exe".to_string()),
        }
    }
}

impl RecoveryPolicy {
    /// True if `path` names a readable file with the expected extension.
    pub fn accepts_executable(&self, path: &Path) -> bool {
        if let Some(expected) = &self.executable_extension {
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(expected));
            if !matches {
                return false;
            }
        }
        path.is_file() && fs::File::open(path).is_ok()
    }

    fn extension_label(&self) -> &str {
        self.executable_extension.as_deref().unwrap_or("executable")
    }
}

impl RunRegistry {
    /// Re-submit every run under the results root that has no terminal
    /// status file yet.
    ///
    /// Each message is passed to `log` as it is produced and also returned.
    /// One bad run directory never stops the pass. Call once at startup,
    /// before anything else can start runs.
    pub async fn resume_unfinished_runs(
        &self,
        results_dir_override: Option<&Path>,
        mut log: impl FnMut(&str),
    ) -> Vec<String> {
        let mut messages = Vec::new();
        let mut report = |message: String| {
            log(&message);
            messages.push(message);
        };

        let results_dir = self.resolve_results_dir(results_dir_override);
        if !results_dir.is_dir() {
            report(format!(
                "Results directory '{}' does not exist. Nothing to resume.",
                results_dir.display()
            ));
            return messages;
        }

        let run_dirs = match list_run_dirs(&results_dir) {
            Ok(dirs) => dirs,
            Err(e) => {
                warn!(path = %results_dir.display(), error = %e, "Failed to scan results directory");
                report(format!(
                    "Failed to scan results directory '{}': {e}",
                    results_dir.display()
                ));
                return messages;
            }
        };

        let layout = RunLayout::new(&results_dir);
        for run_dir in run_dirs {
            let Some(name) = run_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let run_id = RunId::new(name);

            let reported = read_reported_status(&layout.status_path(&run_id));
            if RunStatus::is_terminal_report(reported.as_deref()) {
                continue;
            }

            let Some(metadata) = RunMetadata::try_load(&run_dir) else {
                report(format!(
                    "Skipped '{run_id}' because run_metadata.json is missing or unreadable."
                ));
                continue;
            };

            let executable_ok = metadata
                .env_path
                .as_deref()
                .is_some_and(|path| self.recovery.accepts_executable(path));
            if !executable_ok {
                let shown = metadata
                    .env_path
                    .as_ref()
                    .map_or_else(|| "<null>".to_string(), |p| p.display().to_string());
                report(format!(
                    "Skipped '{run_id}' because envPath is missing or not a valid .{} ({shown}).",
                    self.recovery.extension_label()
                ));
                continue;
            }

            let previous = reported
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|| "unknown".to_string());
            match self.try_start(metadata.into_options()).await {
                Ok(StartResult::Started(record)) => {
                    info!(run_id = %record.run_id, previous_status = %previous, "Resumed run");
                    report(format!(
                        "Resumed unfinished training '{}' (previous status: {previous}).",
                        record.run_id
                    ));
                }
                Ok(StartResult::Conflict { message, .. }) => report(message),
                Err(e) => {
                    warn!(run_id = %run_id, error = %e, "Failed to resume run");
                    report(format!("Failed to resume '{run_id}': {e}"));
                }
            }
        }

        messages
    }
}

/// Subdirectories of `root`, sorted by name.
fn list_run_dirs(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}
