//! Report handler.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::warn;

use crate::http::responses::{ErrorResponse, RunLookupRequest};
use crate::report::build_report;
use crate::state::AppState;
use crate::usage::REPORT_USAGE;

/// Collect the artifacts of a run into one document.
pub async fn report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunLookupRequest>,
) -> impl IntoResponse {
    let run_id = match req.parse_run_id() {
        Ok(run_id) => run_id,
        Err(body) => {
            return (StatusCode::BAD_REQUEST, Json(body.with_usage(REPORT_USAGE))).into_response()
        }
    };

    let results_dir = state
        .registry
        .resolve_results_dir(req.results_dir().as_deref());

    match build_report(&run_id, &results_dir) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            warn!(run_id = %run_id, error = %e, "Report failed");
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string()))).into_response()
        }
    }
}
