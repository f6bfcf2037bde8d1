//! Status payload returned to callers, and the file-based fallback used
//! when a run is not tracked in memory.

use std::path::{Path, PathBuf};

use mentor_core::{RunId, RunLayout, RunStatus};
use serde::Serialize;

/// Status of one run as reported to callers. Recomputed on every query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatusPayload {
    pub run_id: RunId,
    pub status: RunStatus,
    pub completed: bool,
    pub exit_code: Option<i32>,
    pub results_directory: Option<PathBuf>,
    pub training_status_path: Option<PathBuf>,
    pub message: Option<String>,
    #[serde(rename = "tensorboard_url")]
    pub monitor_url: Option<String>,
}

impl RunStatusPayload {
    /// Build a payload from what is on disk under `results_dir`.
    ///
    /// - status file present: normalized status, completed
    /// - run directory present without status file: `unknown`
    /// - no run directory: `not-found`
    pub fn from_files(run_id: &RunId, results_dir: &Path) -> Self {
        let layout = RunLayout::new(results_dir);
        let status_path = layout.status_path(run_id);
        let run_dir = layout.run_dir(run_id);

        let (status, completed, message) = if status_path.is_file() {
            let reported = read_reported_status(&status_path);
            (RunStatus::from_reported(reported.as_deref()), true, None)
        } else if run_dir.is_dir() {
            (
                RunStatus::Unknown,
                false,
                Some(
                    "Run directory exists but training_status.json has not been written yet."
                        .to_string(),
                ),
            )
        } else {
            (
                RunStatus::NotFound,
                false,
                Some(format!("No run data found at '{}'.", run_dir.display())),
            )
        };

        Self {
            run_id: run_id.clone(),
            status,
            completed,
            exit_code: None,
            results_directory: Some(results_dir.to_path_buf()),
            training_status_path: Some(status_path),
            message,
            monitor_url: None,
        }
    }
}

/// Read the `status` string from a terminal status file.
///
/// Returns `None` when the file is missing, unreadable, not a JSON object or
/// has no string `status` field.
pub fn read_reported_status(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&contents).ok()?;
    value.get("status")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_status(root: &Path, run: &str, contents: &str) {
        let logs = root.join(run).join("run_logs");
        fs::create_dir_all(&logs).unwrap();
        fs::write(logs.join("training_status.json"), contents).unwrap();
    }

    #[test]
    fn test_missing_run_directory_is_not_found() {
        let temp = TempDir::new().unwrap();
        let payload = RunStatusPayload::from_files(&RunId::new("ghost"), temp.path());

        assert_eq!(payload.status, RunStatus::NotFound);
        assert!(!payload.completed);
        assert!(payload.message.unwrap().contains("No run data found"));
    }

    #[test]
    fn test_directory_without_status_file_is_unknown() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("pending")).unwrap();

        let payload = RunStatusPayload::from_files(&RunId::new("pending"), temp.path());

        assert_eq!(payload.status, RunStatus::Unknown);
        assert!(!payload.completed);
        assert!(payload.message.is_some());
    }

    #[test]
    fn test_status_file_is_normalized() {
        let temp = TempDir::new().unwrap();
        write_status(temp.path(), "a", r#"{"status":"Success"}"#);
        write_status(temp.path(), "b", r#"{"status":"completed"}"#);
        write_status(temp.path(), "c", r#"{"status":"failure"}"#);
        write_status(temp.path(), "d", r#"{"metadata":{}}"#);

        let status = |id: &str| RunStatusPayload::from_files(&RunId::new(id), temp.path());
        assert_eq!(status("a").status, RunStatus::Succeeded);
        assert!(status("a").completed);
        assert_eq!(status("b").status, RunStatus::Succeeded);
        assert_eq!(status("c").status, RunStatus::Failed);
        assert_eq!(status("d").status, RunStatus::Completed);
    }

    #[test]
    fn test_payload_serializes_with_wire_keys() {
        let temp = TempDir::new().unwrap();
        let payload = RunStatusPayload::from_files(&RunId::new("x"), temp.path());
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["run_id"], "x");
        assert_eq!(json["status"], "not-found");
        assert_eq!(json["completed"], false);
        assert!(json.get("tensorboard_url").is_some());
        assert!(json.get("training_status_path").is_some());
    }

    #[test]
    fn test_read_reported_status_tolerates_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("s.json");
        assert_eq!(read_reported_status(&path), None);
        fs::write(&path, "[1,2]").unwrap();
        assert_eq!(read_reported_status(&path), None);
        fs::write(&path, r#"{"status":5}"#).unwrap();
        assert_eq!(read_reported_status(&path), None);
        fs::write(&path, r#"{"status":"Failed"}"#).unwrap();
        assert_eq!(read_reported_status(&path).as_deref(), Some("Failed"));
    }
}
