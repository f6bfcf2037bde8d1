//! Terminal result of one supervised run.

use std::sync::Arc;

use crate::error::RunnerError;

/// Result of one supervised training run. Produced exactly once per run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Trainer exit code; `None` if it never ran or was killed by a signal.
    pub exit_code: Option<i32>,
    /// Error that ended the run before a normal exit.
    pub error: Option<Arc<RunnerError>>,
}

impl RunOutcome {
    pub fn from_exit_code(exit_code: Option<i32>) -> Self {
        Self {
            exit_code,
            error: None,
        }
    }

    pub fn from_error(error: RunnerError) -> Self {
        Self {
            exit_code: None,
            error: Some(Arc::new(error)),
        }
    }

    /// True iff there is no error and the trainer exited with code 0.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.exit_code == Some(0)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error.as_deref(), Some(RunnerError::Cancelled))
    }

    /// Human-readable reason for a failed outcome, `None` on success.
    pub fn failure_message(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        Some(match (&self.error, self.exit_code) {
            (Some(error), _) => error.to_string(),
            (None, Some(code)) => format!("Training process exited with code {code}."),
            (None, None) => "Training process was terminated by a signal.".to_string(),
        })
    }
}
