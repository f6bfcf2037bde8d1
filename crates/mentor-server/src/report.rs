//! Artifact report of a finished run.
//!
//! Collects what the trainer left under `<results>/<run_id>/` into one JSON
//! document: the terminal status, the timers and the effective trainer
//! configuration.

use std::fs;
use std::path::{Path, PathBuf};

use mentor_core::layout::{RUN_LOGS_DIR, STATUS_FILE};
use mentor_core::RunId;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

const TIMERS_FILE: &str = "timers.json";
const CONFIGURATION_FILE: &str = "configuration.yaml";

/// Errors while building a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Run directory not found at '{0}'.")]
    RunDirectoryMissing(String),

    #[error("Run logs directory not found at '{0}'.")]
    RunLogsMissing(String),

    #[error("training_status.json not found at '{0}'. Ensure the run completed successfully.")]
    StatusMissing(String),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON from '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One file of the report.
#[derive(Debug, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub exists: bool,
    pub content: Option<Value>,
}

impl Artifact {
    fn present(path: PathBuf, content: Value) -> Self {
        Self {
            path,
            exists: true,
            content: Some(content),
        }
    }

    fn missing(path: PathBuf) -> Self {
        Self {
            path,
            exists: false,
            content: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifacts {
    pub training_status: Artifact,
    pub timers: Artifact,
    pub configuration: Artifact,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub run_id: RunId,
    pub results_directory: PathBuf,
    pub run_directory: PathBuf,
    pub run_logs_directory: PathBuf,
    pub artifacts: Artifacts,
}

/// Build the report for `run_id` under `results_dir`.
pub fn build_report(run_id: &RunId, results_dir: &Path) -> Result<TrainingReport, ReportError> {
    let run_directory = results_dir.join(run_id.as_str());
    if !run_directory.exists() {
        return Err(ReportError::RunDirectoryMissing(display(&run_directory)));
    }

    let run_logs_directory = run_directory.join(RUN_LOGS_DIR);
    if !run_logs_directory.exists() {
        return Err(ReportError::RunLogsMissing(display(&run_logs_directory)));
    }

    let status_path = run_logs_directory.join(STATUS_FILE);
    if !status_path.exists() {
        return Err(ReportError::StatusMissing(display(&status_path)));
    }
    let training_status = Artifact::present(status_path.clone(), load_json(&status_path)?);

    let timers_path = run_logs_directory.join(TIMERS_FILE);
    let timers = if timers_path.exists() {
        Artifact::present(timers_path.clone(), load_json(&timers_path)?)
    } else {
        Artifact::missing(timers_path)
    };

    let configuration_path = run_directory.join(CONFIGURATION_FILE);
    let configuration = if configuration_path.exists() {
        let bytes = fs::read(&configuration_path).map_err(|source| ReportError::Read {
            path: display(&configuration_path),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Artifact::present(configuration_path, Value::String(text))
    } else {
        Artifact::missing(configuration_path)
    };

    Ok(TrainingReport {
        run_id: run_id.clone(),
        results_directory: results_dir.to_path_buf(),
        run_directory,
        run_logs_directory,
        artifacts: Artifacts {
            training_status,
            timers,
            configuration,
        },
    })
}

fn load_json(path: &Path) -> Result<Value, ReportError> {
    let contents = fs::read_to_string(path).map_err(|source| ReportError::Read {
        path: display(path),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ReportError::Parse {
        path: display(path),
        source,
    })
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
