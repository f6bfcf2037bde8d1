//! Run status values and normalization of externally reported status text.

use serde::{Serialize, Serializer};
use std::fmt;

/// Status of a training run as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// Training process is alive under this service.
    Running,
    /// Run finished successfully.
    Succeeded,
    /// Run finished unsuccessfully, was cancelled, or could not be spawned.
    Failed,
    /// Run directory exists but the trainer has not written a terminal status.
    Unknown,
    /// No run directory exists under the results root.
    NotFound,
    /// A terminal status file exists but carries no `status` string.
    Completed,
    /// A terminal status file carries a value this service does not recognize.
    Reported(String),
}

impl RunStatus {
    /// Normalize the `status` string written by the trainer into a run status.
    ///
    /// Matching is case-insensitive. Unrecognized values are passed through
    /// verbatim and a missing value maps to [`RunStatus::Completed`].
    pub fn from_reported(reported: Option<&str>) -> Self {
        let Some(raw) = reported else {
            return Self::Completed;
        };
        match raw.to_lowercase().as_str() {
            "success" | "succeeded" | "completed" => Self::Succeeded,
            "failure" | "failed" => Self::Failed,
            _ => Self::Reported(raw.to_string()),
        }
    }

    /// Returns true if the reported string denotes a finished run.
    ///
    /// Used by recovery to decide whether a run directory can be left alone.
    pub fn is_terminal_report(reported: Option<&str>) -> bool {
        matches!(
            reported.map(str::to_lowercase).as_deref(),
            Some("succeeded" | "success" | "failed" | "failure" | "completed")
        )
    }

    /// Returns true while the run is still executing under this service.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Wire representation of the status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
            Self::NotFound => "not-found",
            Self::Completed => "completed",
            Self::Reported(raw) => raw,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
