//! Process supervision for one training run.
//!
//! A [`Supervisor`] runs exactly one trainer process and, when requested,
//! one monitor process next to it. Both streams of both processes are
//! drained into the run log. The trainer's exit decides the outcome; the
//! monitor is best-effort and torn down once the trainer is gone.
//!
//! Each process leads its own process group, so stopping one also stops
//! anything it started. The per-run scratch directory is removed afterwards.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use mentor_core::RunOptions;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::command::CommandLine;
use crate::error::RunnerError;
use crate::log::{join_readers, pump, LogSink, RunLog};
use crate::monitor::is_port_listening;
use crate::outcome::RunOutcome;
use crate::process::{isolate, terminate, GroupGuard};
use crate::toolchain::Toolchain;

/// How long to wait for a stream reader after its process exited.
const READER_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// How long to wait for the log writer to drain before returning.
const LOG_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Grace period between SIGTERM and SIGKILL for a cancelled trainer.
const TRAINER_STOP_GRACE: Duration = Duration::from_secs(10);

/// Grace period between SIGTERM and SIGKILL for the monitor.
const MONITOR_STOP_GRACE: Duration = Duration::from_secs(5);

/// Create `<root>/<random>` for one subprocess invocation.
///
/// The directory is exported as `TMP`/`TEMP`/`TMPDIR`, so concurrent runs of
/// the same tool never share transient files.
pub fn allocate_scratch_dir(root: &Path) -> io::Result<PathBuf> {
    let dir = root.join(Uuid::new_v4().simple().to_string());
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Remove a scratch directory once nothing uses it. Failures are logged only.
async fn release_scratch_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        warn!(path = %dir.display(), error = %e, "Failed to remove scratch directory");
    }
}

/// A spawned process and the tasks draining its output.
///
/// Dropping it kills whatever is left of the process group.
struct Supervised {
    child: Child,
    readers: Vec<JoinHandle<io::Result<u64>>>,
    _group: GroupGuard,
}

/// Supervises one training run.
#[derive(Debug, Clone)]
pub struct Supervisor {
    options: RunOptions,
    toolchain: Arc<Toolchain>,
    log_path: PathBuf,
}

impl Supervisor {
    pub fn new(options: RunOptions, toolchain: Arc<Toolchain>, log_path: PathBuf) -> Self {
        Self {
            options,
            toolchain,
            log_path,
        }
    }

    /// Monitor URL reported for this run (set whenever a monitor was requested).
    pub fn monitor_url(&self) -> Option<String> {
        self.toolchain.monitor_url(&self.options)
    }

    /// Run the trainer to completion and return its outcome.
    ///
    /// Never fails: every error is folded into the returned [`RunOutcome`].
    pub async fn run(self, cancel: CancellationToken) -> RunOutcome {
        let run_id = self.options.run_id.clone();
        match self.execute(&cancel).await {
            Ok(exit_code) => {
                info!(run_id = %run_id, exit_code = ?exit_code, "Training process exited");
                RunOutcome::from_exit_code(exit_code)
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Training run failed");
                RunOutcome::from_error(e)
            }
        }
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<Option<i32>, RunnerError> {
        let results_dir = &self.options.results_dir;
        tokio::fs::create_dir_all(results_dir)
            .await
            .map_err(|source| RunnerError::CreateDir {
                path: results_dir.display().to_string(),
                source,
            })?;

        let scratch_root = &self.toolchain.scratch_root;
        let scratch = allocate_scratch_dir(scratch_root).map_err(|source| {
            RunnerError::CreateDir {
                path: scratch_root.display().to_string(),
                source,
            }
        })?;

        let result = self.supervise(&scratch, cancel).await;
        release_scratch_dir(&scratch).await;
        result
    }

    async fn supervise(
        &self,
        scratch: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<i32>, RunnerError> {
        let results_dir = &self.options.results_dir;
        let reuse_monitor = self.options.launch_monitor
            && is_port_listening(self.toolchain.monitor_port).await;
        let training_cmd = self.toolchain.training_command(&self.options);
        let monitor_cmd = (self.options.launch_monitor && !reuse_monitor)
            .then(|| self.toolchain.monitor_command(&self.options));

        let log = RunLog::open(&self.log_path)
            .await
            .map_err(|source| RunnerError::LogOpen {
                path: self.log_path.display().to_string(),
                source,
            })?;

        log.line(format!(
            "Writing training artifacts to '{}'.",
            results_dir.display()
        ));
        log.line("");
        log.line("Starting training session with command:");
        log.line(training_cmd.to_string());
        log.line("");

        info!(
            run_id = %self.options.run_id,
            scratch = %scratch.display(),
            command = %training_cmd,
            "Starting training session"
        );

        let mut monitor = None;
        if let Some(cmd) = &monitor_cmd {
            log.line("Starting TensorBoard in parallel with command:");
            log.line(cmd.to_string());
            log.line("");
            match spawn_supervised(cmd, scratch, log.sink()) {
                Ok(process) => monitor = Some(process),
                Err(e) => {
                    warn!(run_id = %self.options.run_id, error = %e, "Failed to start monitor");
                    log.line(format!("Failed to start TensorBoard: {e}"));
                    log.line("");
                }
            }
        } else if reuse_monitor {
            log.line(format!(
                "TensorBoard already running on port {}; not launching another instance.",
                self.toolchain.monitor_port
            ));
            log.line("");
        }

        let mut trainer = match spawn_supervised(&training_cmd, scratch, log.sink()) {
            Ok(process) => process,
            Err(e) => {
                error!(run_id = %self.options.run_id, error = %e, "Failed to spawn trainer");
                log.line(format!("Failed to start training: {e}"));
                if let Some(process) = monitor {
                    stop_monitor(process, &log).await;
                }
                log.close(LOG_CLOSE_TIMEOUT).await;
                return Err(e);
            }
        };

        let exited = tokio::select! {
            status = trainer.child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };
        let waited = match exited {
            Some(status) => status
                .map(|status| status.code())
                .map_err(RunnerError::from),
            None => {
                warn!(run_id = %self.options.run_id, "Cancellation requested; stopping trainer");
                if let Err(e) = terminate(&mut trainer.child, TRAINER_STOP_GRACE).await {
                    warn!(run_id = %self.options.run_id, error = %e, "Failed to stop trainer");
                }
                Err(RunnerError::Cancelled)
            }
        };
        join_readers(trainer.readers, READER_JOIN_TIMEOUT).await;

        if let Some(process) = monitor {
            stop_monitor(process, &log).await;
        }

        if matches!(waited, Err(RunnerError::Cancelled)) {
            log.line("");
            log.line("Training was canceled.");
        }
        log.close(LOG_CLOSE_TIMEOUT).await;
        waited
    }
}

/// Spawn `cmd` with null stdin, both streams drained into `sink`.
fn spawn_supervised(
    cmd: &CommandLine,
    scratch: &Path,
    sink: LogSink,
) -> Result<Supervised, RunnerError> {
    let mut command = cmd.to_command();
    command
        .env("TMP", scratch)
        .env("TEMP", scratch)
        .env("TMPDIR", scratch)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    isolate(&mut command);

    let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
        program: cmd.program().to_string_lossy().into_owned(),
        source,
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or(RunnerError::MissingPipe("stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or(RunnerError::MissingPipe("stderr"))?;

    let readers = vec![pump(stdout, sink.clone()), pump(stderr, sink)];
    let group = GroupGuard::new(&child);
    Ok(Supervised {
        child,
        readers,
        _group: group,
    })
}

/// Stop a monitor this supervisor launched. Failures are logged only.
async fn stop_monitor(mut process: Supervised, log: &RunLog) {
    match process.child.try_wait() {
        Ok(Some(status)) => {
            info!(exit_code = ?status.code(), "Monitor already exited");
        }
        Ok(None) => {
            log.line("");
            log.line("Training session finished. Stopping TensorBoard...");
            match terminate(&mut process.child, MONITOR_STOP_GRACE).await {
                Ok(status) => info!(exit_code = ?status.code(), "Monitor stopped"),
                Err(e) => warn!(error = %e, "Failed to stop monitor"),
            }
        }
        Err(e) => warn!(error = %e, "Failed to query monitor state"),
    }
    join_readers(process.readers, READER_JOIN_TIMEOUT).await;
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use mentor_core::RunId;
    use std::collections::HashSet;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    /// Write an executable `/bin/sh` script and return its path.
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn options(temp: &TempDir, launch_monitor: bool) -> RunOptions {
        RunOptions {
            executable_path: None,
            config_path: temp.path().join("config.yaml"),
            run_id: RunId::new("sup-run"),
            results_dir: temp.path().join("results"),
            environment_name: "mlagents".to_string(),
            base_port: None,
            no_graphics: false,
            skip_activation: true,
            launch_monitor,
        }
    }

    fn toolchain(temp: &TempDir, trainer: &Path, monitor: &Path, port: u16) -> Arc<Toolchain> {
        Arc::new(Toolchain {
            activator: None,
            trainer: trainer.display().to_string(),
            monitor: monitor.display().to_string(),
            monitor_port: port,
            scratch_root: temp.path().join("scratch"),
        })
    }

    /// Whether `pid` names a live, unreaped process.
    #[cfg(target_os = "linux")]
    fn is_alive(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z" && state != "X"),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    async fn wait_for_exit(pid: i32) -> bool {
        for _ in 0..100 {
            if !is_alive(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    /// Wait for a script to write a pid into `path`.
    #[cfg(target_os = "linux")]
    async fn read_pid(path: &Path) -> i32 {
        for _ in 0..100 {
            if let Ok(text) = std::fs::read_to_string(path) {
                if let Ok(pid) = text.trim().parse() {
                    return pid;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("no pid written to {}", path.display());
    }

    async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_scratch_dirs_are_distinct() {
        let temp = TempDir::new().unwrap();
        let dirs: HashSet<PathBuf> = (0..16)
            .map(|_| allocate_scratch_dir(temp.path()).unwrap())
            .collect();
        assert_eq!(dirs.len(), 16);
        assert!(dirs.iter().all(|d| d.is_dir()));
    }

    #[tokio::test]
    async fn test_exit_code_and_output_are_captured() {
        let temp = TempDir::new().unwrap();
        let trainer = script(
            temp.path(),
            "trainer.sh",
            "echo \"trainer args: $*\"\necho \"scratch=$TMPDIR\"\necho oops >&2\nexit 3",
        );
        let monitor = script(temp.path(), "monitor.sh", "exit 0");
        let log_path = temp.path().join("run.log");
        let supervisor = Supervisor::new(
            options(&temp, false),
            toolchain(&temp, &trainer, &monitor, 1),
            log_path.clone(),
        );

        let outcome = supervisor.run(CancellationToken::new()).await;

        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.is_success());
        assert!(temp.path().join("results").is_dir());

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("Starting training session with command:"));
        assert!(log.contains("--run-id=sup-run"));
        assert!(log.contains("oops"));
        assert!(log.contains(&format!("scratch={}", temp.path().join("scratch").display())));
        assert!(!log.contains("TensorBoard"));

        let leftover = std::fs::read_dir(temp.path().join("scratch")).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_becomes_outcome_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("does-not-exist");
        let supervisor = Supervisor::new(
            options(&temp, false),
            toolchain(&temp, &missing, &missing, 1),
            temp.path().join("run.log"),
        );

        let outcome = supervisor.run(CancellationToken::new()).await;

        assert_eq!(outcome.exit_code, None);
        assert!(matches!(
            outcome.error.as_deref(),
            Some(RunnerError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_launched_monitor_is_stopped_after_training() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("monitor-started");
        let trainer = script(temp.path(), "trainer.sh", "sleep 1\nexit 0");
        let monitor = script(
            temp.path(),
            "monitor.sh",
            &format!("touch '{}'\nexec sleep 30", marker.display()),
        );
        let port = free_port().await;
        let log_path = temp.path().join("run.log");
        let supervisor = Supervisor::new(
            options(&temp, true),
            toolchain(&temp, &trainer, &monitor, port),
            log_path.clone(),
        );
        assert_eq!(
            supervisor.monitor_url(),
            Some(format!("http://localhost:{port}"))
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(20),
            supervisor.run(CancellationToken::new()),
        )
        .await
        .expect("monitor teardown must not hang the run");

        assert!(outcome.is_success());
        assert!(marker.exists());
        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("Starting TensorBoard in parallel with command:"));
        assert!(log.contains("Stopping TensorBoard"));
    }

    #[tokio::test]
    async fn test_existing_monitor_is_not_duplicated() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("monitor-started");
        let trainer = script(temp.path(), "trainer.sh", "exit 0");
        let monitor = script(
            temp.path(),
            "monitor.sh",
            &format!("touch '{}'", marker.display()),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let log_path = temp.path().join("run.log");
        let supervisor = Supervisor::new(
            options(&temp, true),
            toolchain(&temp, &trainer, &monitor, port),
            log_path.clone(),
        );

        assert_eq!(
            supervisor.monitor_url(),
            Some(format!("http://localhost:{port}"))
        );
        let outcome = supervisor.run(CancellationToken::new()).await;

        assert!(outcome.is_success());
        assert!(!marker.exists());
        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains(&format!(
            "TensorBoard already running on port {port}; not launching another instance."
        )));
        drop(listener);
    }

    #[tokio::test]
    async fn test_cancellation_kills_trainer() {
        let temp = TempDir::new().unwrap();
        let trainer = script(temp.path(), "trainer.sh", "exec sleep 30");
        let supervisor = Supervisor::new(
            options(&temp, false),
            toolchain(&temp, &trainer, &trainer, 1),
            temp.path().join("run.log"),
        );
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervisor.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(outcome.is_cancelled());
        assert_eq!(outcome.failure_message().as_deref(), Some("Training was canceled."));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_cancellation_stops_processes_started_by_trainer() {
        let temp = TempDir::new().unwrap();
        let pid_file = temp.path().join("child.pid");
        let trainer = script(
            temp.path(),
            "trainer.sh",
            &format!("sleep 30 &\necho $! > '{}'\nwait", pid_file.display()),
        );
        let supervisor = Supervisor::new(
            options(&temp, false),
            toolchain(&temp, &trainer, &trainer, 1),
            temp.path().join("run.log"),
        );
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervisor.run(cancel.clone()));

        let grandchild = read_pid(&pid_file).await;
        assert!(is_alive(grandchild));
        cancel.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(15), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(outcome.is_cancelled());
        assert!(wait_for_exit(grandchild).await, "pid {grandchild} outlived the run");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_launched_monitor_group_is_stopped() {
        let temp = TempDir::new().unwrap();
        let pid_file = temp.path().join("monitor-child.pid");
        let trainer = script(temp.path(), "trainer.sh", "sleep 1\nexit 0");
        let monitor = script(
            temp.path(),
            "monitor.sh",
            &format!("sleep 30 &\necho $! > '{}'\nwait", pid_file.display()),
        );
        let port = free_port().await;
        let supervisor = Supervisor::new(
            options(&temp, true),
            toolchain(&temp, &trainer, &monitor, port),
            temp.path().join("run.log"),
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(20),
            supervisor.run(CancellationToken::new()),
        )
        .await
        .unwrap();

        assert!(outcome.is_success());
        let grandchild = read_pid(&pid_file).await;
        assert!(wait_for_exit(grandchild).await, "pid {grandchild} outlived the run");
    }

    #[tokio::test]
    async fn test_background_child_does_not_hold_up_completion() {
        let temp = TempDir::new().unwrap();
        let pid_file = temp.path().join("child.pid");
        let trainer = script(
            temp.path(),
            "trainer.sh",
            &format!("sleep 30 &\necho $! > '{}'\nexit 0", pid_file.display()),
        );
        let supervisor = Supervisor::new(
            options(&temp, false),
            toolchain(&temp, &trainer, &trainer, 1),
            temp.path().join("run.log"),
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(15),
            supervisor.run(CancellationToken::new()),
        )
        .await
        .expect("a lingering background child must not block the outcome");

        assert!(outcome.is_success());
        assert_eq!(outcome.exit_code, Some(0));
        #[cfg(target_os = "linux")]
        {
            let grandchild = read_pid(&pid_file).await;
            assert!(wait_for_exit(grandchild).await, "pid {grandchild} outlived the run");
        }
        assert_eq!(std::fs::read_dir(temp.path().join("scratch")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_scratch_dir_is_removed_after_spawn_failure() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("does-not-exist");
        let supervisor = Supervisor::new(
            options(&temp, false),
            toolchain(&temp, &missing, &missing, 1),
            temp.path().join("run.log"),
        );

        let outcome = supervisor.run(CancellationToken::new()).await;

        assert!(outcome.error.is_some());
        assert_eq!(std::fs::read_dir(temp.path().join("scratch")).unwrap().count(), 0);
    }
}
