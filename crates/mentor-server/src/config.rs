//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use mentor_core::options::DEFAULT_ENVIRONMENT_NAME;
use mentor_core::OptionDefaults;
use mentor_runner::{RecoveryPolicy, RegistryConfig, Toolchain};

/// Mentor training orchestration server.
#[derive(Parser, Debug, Clone)]
#[command(name = "mentor-server", about = "Start, inspect and resume ML-Agents training runs")]
pub struct ServerConfig {
    /// HTTP bind address
    #[arg(long, default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Default results root for runs that do not specify one
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,

    /// Default conda environment the trainer runs in
    #[arg(long, default_value = DEFAULT_ENVIRONMENT_NAME)]
    pub conda_env: String,

    /// Environment activator (defaults to $CONDA_EXE, then `conda`)
    #[arg(long)]
    pub activator: Option<PathBuf>,

    /// Trainer program
    #[arg(long, default_value = "mlagents-learn")]
    pub trainer: String,

    /// Monitor program
    #[arg(long, default_value = "tensorboard")]
    pub monitor: String,

    /// Port the monitor listens on
    #[arg(long, default_value = "6006")]
    pub monitor_port: u16,

    /// Parent directory of per-process scratch directories
    #[arg(long)]
    pub scratch_root: Option<PathBuf>,

    /// Extension a recorded environment executable must have to be resumed.
    /// Pass an empty value to accept any file.
    #[arg(long, default_value = "exe")]
    pub executable_extension: String,

    /// Do not resume unfinished runs at startup
    #[arg(long)]
    pub skip_resume: bool,
}

impl ServerConfig {
    pub fn toolchain(&self) -> Toolchain {
        let defaults = Toolchain::default();
        Toolchain {
            activator: self.activator.clone(),
            trainer: self.trainer.clone(),
            monitor: self.monitor.clone(),
            monitor_port: self.monitor_port,
            scratch_root: self.scratch_root.clone().unwrap_or(defaults.scratch_root),
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        let extension = self.executable_extension.trim().trim_start_matches('.');
        RegistryConfig {
            default_results_dir: self.results_dir.clone(),
            toolchain: self.toolchain(),
            recovery: RecoveryPolicy {
                executable_extension: (!extension.is_empty()).then(|| extension.to_string()),
            },
        }
    }

    pub fn option_defaults(&self) -> OptionDefaults {
        OptionDefaults {
            results_dir: self.results_dir.clone(),
            environment_name: self.conda_env.clone(),
            ..OptionDefaults::default()
        }
    }
}
