//! Mentor Server

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mentor_runner::RunRegistry;
use mentor_server::http::create_router;
use mentor_server::{AppState, ServerConfig, ServerError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mentor=info".parse()?))
        .with_target(true)
        .init();

    info!(
        results_dir = %config.results_dir.display(),
        trainer = %config.trainer,
        "Mentor server starting"
    );

    let registry = RunRegistry::new(config.registry_config());

    // Must finish before the listener accepts requests that could race it.
    if config.skip_resume {
        info!("[Resume] Skipped (--skip-resume)");
    } else {
        resume(&registry).await;
    }

    let state = AppState::new(registry, config.option_defaults());
    let app = create_router(state);

    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind,
            source,
        })?;
    info!("HTTP server listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    info!("Mentor server stopped");
    Ok(())
}

async fn resume(registry: &Arc<RunRegistry>) {
    info!("[Resume] Checking for unfinished training runs...");
    let messages = registry
        .resume_unfinished_runs(None, |msg| info!("[Resume] {msg}"))
        .await;
    if messages.is_empty() {
        info!("[Resume] No unfinished training runs found.");
    }
    for run in registry.list().await {
        info!(run_id = %run.run_id, status = %run.status, "[Resume] Tracking run");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
