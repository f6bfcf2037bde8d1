//! Mentor Server Library
//!
//! HTTP surface over the run registry: start, status, cancel and report,
//! plus the configuration and startup recovery wiring used by the binary.

pub mod config;
pub mod error;
pub mod http;
pub mod report;
pub mod state;
pub mod usage;

pub use config::ServerConfig;
pub use error::ServerError;
pub use report::{build_report, ReportError, TrainingReport};
pub use state::AppState;
