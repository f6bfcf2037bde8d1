//! HTTP request and response types.

use std::path::PathBuf;

use mentor_core::RunId;
use serde::{Deserialize, Serialize};

// ============================================================================
// Run lookup types
// ============================================================================

/// Request body naming a run, optionally under a non-default results root.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLookupRequest {
    #[serde(default, alias = "run_id")]
    pub run_id: Option<String>,

    #[serde(default, alias = "results_dir")]
    pub results_dir: Option<String>,
}

impl RunLookupRequest {
    /// Trimmed run id, `None` if absent or blank.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// Validated run id, or the error body for a missing or unsafe id.
    pub fn parse_run_id(&self) -> Result<RunId, ErrorResponse> {
        let run_id = self
            .run_id()
            .ok_or_else(|| ErrorResponse::new("runId is required."))?;
        RunId::parse(run_id).map_err(|e| ErrorResponse::new(e.to_string()))
    }

    /// Results root override, `None` if absent or blank.
    pub fn results_dir(&self) -> Option<PathBuf> {
        self.results_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
    }
}

// ============================================================================
// Training types
// ============================================================================

/// Response body for an accepted start request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainResponse {
    pub success: bool,
    pub run_id: String,
    pub status: &'static str,
    pub results_directory: PathBuf,
    pub log_path: PathBuf,
    pub tensorboard_url: Option<String>,
}

/// Response body for a cancel request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub run_id: String,
    pub cancelled: bool,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            usage: None,
            run_id: None,
        }
    }

    pub fn with_usage(mut self, usage: &'static str) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}
