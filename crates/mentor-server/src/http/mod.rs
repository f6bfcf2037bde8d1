//! HTTP server.
//!
//! Provides endpoints for:
//! - Starting a run (`/train`)
//! - Run status (`/train-status`)
//! - Cancelling a run (`/train-cancel`)
//! - Artifact report of a finished run (`/report`)
//! - Health check (`/health`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod handlers;
pub mod responses;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/train", post(handlers::start_training))
        .route("/train-status", post(handlers::training_status))
        .route("/train-cancel", post(handlers::cancel_training))
        .route("/report", post(handlers::report))
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
