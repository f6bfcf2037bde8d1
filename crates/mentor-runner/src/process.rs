//! Process groups for supervised programs.
//!
//! Every supervised program leads its own process group, so wrappers such as
//! `conda run` and whatever they start are signalled together.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};

#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use tokio::time::timeout;
#[cfg(unix)]
use tracing::warn;

/// Make the spawned process the leader of a new process group.
#[cfg(unix)]
pub(crate) fn isolate(command: &mut Command) {
    command.process_group(0);
}

#[cfg(not(unix))]
pub(crate) fn isolate(_command: &mut Command) {}

/// Kills whatever is left of a process group when dropped.
///
/// Catches descendants that outlive a leader which exited on its own.
pub(crate) struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    pub(crate) fn new(child: &Child) -> Self {
        Self { pid: child.id() }
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            signal_group(pid, Signal::SIGKILL);
        }
    }
}

/// Stop the group led by `child`: SIGTERM, then SIGKILL after `grace`.
///
/// Returns the leader's exit status. Descendants still alive once the
/// leader is gone are killed too.
#[cfg(unix)]
pub(crate) async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let Some(pid) = child.id() else {
        return child.wait().await;
    };

    signal_group(pid, Signal::SIGTERM);
    let status = match timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!(pid, "Process group ignored SIGTERM; killing it");
            signal_group(pid, Signal::SIGKILL);
            child.wait().await
        }
    };
    signal_group(pid, Signal::SIGKILL);
    status
}

#[cfg(not(unix))]
pub(crate) async fn terminate(child: &mut Child, _grace: Duration) -> io::Result<ExitStatus> {
    if child.id().is_some() {
        child.start_kill()?;
    }
    child.wait().await
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: Signal) {
    use nix::errno::Errno;

    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid, ?signal, error = %e, "Failed to signal process group"),
    }
}
