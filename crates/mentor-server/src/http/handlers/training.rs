//! Training run handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use mentor_core::{RunOptions, TrainingRequest};
use mentor_runner::StartResult;
use tracing::{error, info, warn};

use crate::http::responses::{CancelResponse, ErrorResponse, RunLookupRequest, TrainResponse};
use crate::state::AppState;
use crate::usage::TRAINING_USAGE;

/// Start a training run.
///
/// Returns as soon as the run is scheduled; progress is read via
/// `/train-status`.
pub async fn start_training(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrainingRequest>,
) -> impl IntoResponse {
    let options = match RunOptions::from_request(&req, &state.defaults) {
        Ok(options) => options,
        Err(e) => {
            warn!(error = %e, "Rejected training request");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(e.to_string()).with_usage(TRAINING_USAGE)),
            )
                .into_response();
        }
    };

    let run_id = options.run_id.clone();
    match state.registry.try_start(options).await {
        Ok(StartResult::Started(run)) => {
            info!(run_id = %run.run_id, "Training run accepted");
            (
                StatusCode::OK,
                Json(TrainResponse {
                    success: true,
                    run_id: run.run_id.to_string(),
                    status: "running",
                    results_directory: run.options.results_dir.clone(),
                    log_path: run.log_path.clone(),
                    tensorboard_url: run.monitor_url.clone(),
                }),
            )
                .into_response()
        }
        Ok(StartResult::Conflict { message, .. }) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(message).with_run_id(run_id.into_inner())),
        )
            .into_response(),
        Err(e) => {
            error!(run_id = %run_id, error = %e, "Failed to start training run");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}

/// Status of a run, live or from disk.
pub async fn training_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunLookupRequest>,
) -> impl IntoResponse {
    let run_id = match req.parse_run_id() {
        Ok(run_id) => run_id,
        Err(body) => return (StatusCode::BAD_REQUEST, Json(body)).into_response(),
    };

    let results_dir = req.results_dir();
    let payload = state
        .registry
        .get_status(&run_id, results_dir.as_deref())
        .await;
    (StatusCode::OK, Json(payload)).into_response()
}

/// Cancel a running run.
pub async fn cancel_training(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunLookupRequest>,
) -> impl IntoResponse {
    let run_id = match req.parse_run_id() {
        Ok(run_id) => run_id,
        Err(body) => return (StatusCode::BAD_REQUEST, Json(body)).into_response(),
    };

    let cancelled = state.registry.cancel(&run_id).await;
    (
        StatusCode::OK,
        Json(CancelResponse {
            run_id: run_id.into_inner(),
            cancelled,
        }),
    )
        .into_response()
}
