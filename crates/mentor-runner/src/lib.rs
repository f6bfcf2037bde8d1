//! Mentor run orchestration.
//!
//! This crate owns the lifecycle of training runs on a single host:
//!
//! - [`RunMetadata`]: the on-disk resume document of a run
//! - [`Supervisor`]: launches the trainer (and optionally a monitor), drains
//!   their output into the run log and produces one [`RunOutcome`]
//! - [`RunRegistry`]: single-flight start semantics, status derivation and
//!   recovery of unfinished runs after a restart
//!
//! # Example
//!
//! ```rust,no_run
//! use mentor_core::{OptionDefaults, RunOptions, TrainingRequest};
//! use mentor_runner::{RegistryConfig, RunRegistry, StartResult};
//!
//! async fn start() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = RunRegistry::new(RegistryConfig::default());
//!     registry.resume_unfinished_runs(None, |msg| println!("[Resume] {msg}")).await;
//!
//!     let request = TrainingRequest {
//!         config: Some("config/ppo/3DBall.yaml".to_string()),
//!         ..Default::default()
//!     };
//!     let options = RunOptions::from_request(&request, &OptionDefaults::default())?;
//!     match registry.try_start(options).await? {
//!         StartResult::Started(run) => println!("log: {}", run.log_path.display()),
//!         StartResult::Conflict { message, .. } => println!("{message}"),
//!     }
//!     Ok(())
//! }
//! ```

mod command;
mod error;
mod log;
mod metadata;
mod monitor;
mod outcome;
mod payload;
mod process;
mod recovery;
mod registry;
mod supervisor;
mod toolchain;

// Re-export main types
pub use command::CommandLine;
pub use error::RunnerError;
pub use metadata::RunMetadata;
pub use monitor::{is_port_listening, monitor_url};
pub use outcome::RunOutcome;
pub use payload::{read_reported_status, RunStatusPayload};
pub use recovery::RecoveryPolicy;
pub use registry::{RegistryConfig, RunRecord, RunRegistry, StartResult};
pub use supervisor::{allocate_scratch_dir, Supervisor};
pub use toolchain::Toolchain;
