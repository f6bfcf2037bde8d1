//! In-memory registry of runs started by this process.
//!
//! The registry enforces at most one active run per identifier. Each started
//! run is a tokio task owning one [`Supervisor`]; the registry keeps the
//! task handle plus a `watch` receiver the task publishes its outcome on, so
//! status queries only read already-materialized state.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mentor_core::layout::absolutize;
use mentor_core::{RunId, RunLayout, RunOptions, RunStatus};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::RunnerError;
use crate::metadata::RunMetadata;
use crate::outcome::RunOutcome;
use crate::payload::RunStatusPayload;
use crate::recovery::RecoveryPolicy;
use crate::supervisor::Supervisor;
use crate::toolchain::Toolchain;

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Results root used when a status or recovery call has no override.
    pub default_results_dir: PathBuf,
    /// Programs launched for every run.
    pub toolchain: Toolchain,
    /// Rules for which unfinished runs may be resumed.
    pub recovery: RecoveryPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_results_dir: PathBuf::from("results"),
            toolchain: Toolchain::default(),
            recovery: RecoveryPolicy::default(),
        }
    }
}

/// The asynchronous execution unit behind a record.
struct Execution {
    task: JoinHandle<()>,
    outcome: watch::Receiver<Option<RunOutcome>>,
    cancel: CancellationToken,
}

/// A run tracked by the registry.
pub struct RunRecord {
    pub run_id: RunId,
    pub options: RunOptions,
    pub log_path: PathBuf,
    pub monitor_url: Option<String>,
    execution: Execution,
}

impl RunRecord {
    /// True once the run reached a terminal state.
    pub fn is_completed(&self) -> bool {
        !self.state().0.is_running()
    }

    /// The run's outcome, once the supervisor produced one.
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.execution.outcome.borrow().clone()
    }

    /// Derive status, exit code and message from the execution unit.
    fn state(&self) -> (RunStatus, Option<i32>, Option<String>) {
        // Read task completion before the outcome: the task publishes its
        // outcome before it finishes.
        let finished = self.execution.task.is_finished();
        match self.outcome() {
            Some(outcome) if outcome.is_cancelled() => (
                RunStatus::Failed,
                outcome.exit_code,
                Some("Training was canceled.".to_string()),
            ),
            Some(outcome) if outcome.is_success() => {
                (RunStatus::Succeeded, outcome.exit_code, None)
            }
            Some(outcome) => (
                RunStatus::Failed,
                outcome.exit_code,
                outcome.failure_message(),
            ),
            None if finished && self.execution.cancel.is_cancelled() => (
                RunStatus::Failed,
                None,
                Some("Training was canceled.".to_string()),
            ),
            None if finished => (
                RunStatus::Failed,
                None,
                Some("Training task ended without reporting an outcome.".to_string()),
            ),
            None => (RunStatus::Running, None, None),
        }
    }

    /// Status payload for this record.
    pub fn to_payload(&self) -> RunStatusPayload {
        let (status, exit_code, message) = self.state();
        let layout = RunLayout::new(&self.options.results_dir);
        RunStatusPayload {
            run_id: self.run_id.clone(),
            completed: !status.is_running(),
            status,
            exit_code,
            results_directory: Some(self.options.results_dir.clone()),
            training_status_path: Some(layout.status_path(&self.run_id)),
            message,
            monitor_url: self.monitor_url.clone(),
        }
    }
}

impl std::fmt::Debug for RunRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRecord")
            .field("run_id", &self.run_id)
            .field("log_path", &self.log_path)
            .field("monitor_url", &self.monitor_url)
            .finish_non_exhaustive()
    }
}

/// Result of [`RunRegistry::try_start`].
#[derive(Debug, Clone)]
pub enum StartResult {
    /// A new run was scheduled.
    Started(Arc<RunRecord>),
    /// A run with the same id is active or still starting; nothing was
    /// spawned. `existing` is `None` while the other start is in flight.
    Conflict {
        existing: Option<Arc<RunRecord>>,
        message: String,
    },
}

impl StartResult {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// Tracked records plus the ids whose start is in flight.
#[derive(Default)]
struct Runs {
    records: HashMap<RunId, Arc<RunRecord>>,
    starting: HashSet<RunId>,
}

impl Runs {
    fn conflict(&self, run_id: &RunId) -> Option<StartResult> {
        let active = self
            .records
            .get(run_id)
            .filter(|record| !record.is_completed())
            .cloned();
        if active.is_none() && !self.starting.contains(run_id) {
            return None;
        }
        Some(StartResult::Conflict {
            existing: active,
            message: format!("Training run '{run_id}' is already in progress."),
        })
    }
}

/// Holds `run_id` in [`Runs::starting`] until released or dropped.
struct Reservation {
    runs: Arc<Mutex<Runs>>,
    run_id: RunId,
    armed: bool,
}

impl Reservation {
    fn release(mut self, runs: &mut Runs) {
        runs.starting.remove(&self.run_id);
        self.armed = false;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // The start future was dropped mid-flight.
        if let Ok(mut runs) = self.runs.try_lock() {
            runs.starting.remove(&self.run_id);
            return;
        }
        let runs = self.runs.clone();
        let run_id = self.run_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    runs.lock().await.starting.remove(&run_id);
                });
            }
            Err(_) => warn!(run_id = %self.run_id, "Could not release start reservation"),
        }
    }
}

/// Concurrency-safe map from run id to its live record.
pub struct RunRegistry {
    runs: Arc<Mutex<Runs>>,
    toolchain: Arc<Toolchain>,
    pub(crate) default_results_dir: PathBuf,
    pub(crate) recovery: RecoveryPolicy,
}

impl RunRegistry {
    pub fn new(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self {
            runs: Arc::new(Mutex::new(Runs::default())),
            toolchain: Arc::new(config.toolchain),
            default_results_dir: config.default_results_dir,
            recovery: config.recovery,
        })
    }

    /// Start a run unless one with the same id is active or starting.
    ///
    /// The id is reserved under the lock, the metadata is written without
    /// it, and the record is inserted under it again. Returns as soon as the
    /// run's task is scheduled. Must be called from within a tokio runtime.
    pub async fn try_start(&self, options: RunOptions) -> Result<StartResult, RunnerError> {
        let reservation = {
            let mut runs = self.runs.lock().await;
            if let Some(conflict) = runs.conflict(&options.run_id) {
                warn!(run_id = %options.run_id, "Run already in progress");
                return Ok(conflict);
            }
            runs.starting.insert(options.run_id.clone());
            Reservation {
                runs: self.runs.clone(),
                run_id: options.run_id.clone(),
                armed: true,
            }
        };

        let saved = save_metadata(&options).await;

        let mut runs = self.runs.lock().await;
        reservation.release(&mut runs);
        saved?;

        let record = Arc::new(self.launch(options));
        runs.records.insert(record.run_id.clone(), record.clone());
        Ok(StartResult::Started(record))
    }

    /// Schedule the supervisor task for a run whose metadata is on disk.
    fn launch(&self, options: RunOptions) -> RunRecord {
        let layout = RunLayout::new(&options.results_dir);
        let run_id = options.run_id.clone();

        let log_path = layout.log_path(&run_id);
        let supervisor = Supervisor::new(options.clone(), self.toolchain.clone(), log_path.clone());
        let monitor_url = supervisor.monitor_url();

        let (outcome_tx, outcome_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task_run_id = run_id.clone();
        let task = tokio::spawn(async move {
            let outcome = supervisor.run(task_cancel).await;
            info!(
                run_id = %task_run_id,
                success = outcome.is_success(),
                exit_code = ?outcome.exit_code,
                "Run finished"
            );
            outcome_tx.send_replace(Some(outcome));
        });

        info!(
            run_id = %run_id,
            log_path = %log_path.display(),
            monitor_url = ?monitor_url,
            "Run started"
        );

        RunRecord {
            run_id,
            options,
            log_path,
            monitor_url,
            execution: Execution {
                task,
                outcome: outcome_rx,
                cancel,
            },
        }
    }

    /// Status of `run_id`, from the live record if tracked, else from disk.
    pub async fn get_status(
        &self,
        run_id: &RunId,
        results_dir_override: Option<&Path>,
    ) -> RunStatusPayload {
        if let Some(record) = self.get(run_id).await {
            return record.to_payload();
        }
        let results_dir = self.resolve_results_dir(results_dir_override);
        RunStatusPayload::from_files(run_id, &results_dir)
    }

    /// Tracked record for `run_id`, if any.
    pub async fn get(&self, run_id: &RunId) -> Option<Arc<RunRecord>> {
        self.runs.lock().await.records.get(run_id).cloned()
    }

    /// Request cancellation of an active run.
    ///
    /// Returns false if the run is not tracked or already finished.
    pub async fn cancel(&self, run_id: &RunId) -> bool {
        let Some(record) = self.get(run_id).await else {
            return false;
        };
        if record.is_completed() {
            return false;
        }
        info!(run_id = %run_id, "Cancelling run");
        record.execution.cancel.cancel();
        true
    }

    /// Status payloads of every tracked run, ordered by run id.
    pub async fn list(&self) -> Vec<RunStatusPayload> {
        let records: Vec<Arc<RunRecord>> =
            self.runs.lock().await.records.values().cloned().collect();
        let mut payloads: Vec<RunStatusPayload> =
            records.iter().map(|record| record.to_payload()).collect();
        payloads.sort_by(|a, b| a.run_id.as_str().cmp(b.run_id.as_str()));
        payloads
    }

    /// Number of tracked records.
    pub async fn run_count(&self) -> usize {
        self.runs.lock().await.records.len()
    }

    /// Absolute results root for an optional override.
    pub fn resolve_results_dir(&self, results_dir_override: Option<&Path>) -> PathBuf {
        let candidate = results_dir_override.unwrap_or(&self.default_results_dir);
        absolutize(candidate).unwrap_or_else(|_| candidate.to_path_buf())
    }
}

/// Write the resume document on the blocking pool.
async fn save_metadata(options: &RunOptions) -> Result<PathBuf, RunnerError> {
    let run_dir = RunLayout::new(&options.results_dir).run_dir(&options.run_id);
    let options = options.clone();
    tokio::task::spawn_blocking(move || RunMetadata::save(&run_dir, &options))
        .await
        .map_err(|e| RunnerError::Io(io::Error::other(e)))?
}
