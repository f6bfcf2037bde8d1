//! External programs the supervisor launches, and how their command lines
//! are assembled from [`RunOptions`].

use std::path::PathBuf;

use mentor_core::RunOptions;

use crate::command::CommandLine;
use crate::monitor::monitor_url;

/// Port TensorBoard listens on unless configured otherwise.
pub const DEFAULT_MONITOR_PORT: u16 = 6006;

/// Programs and host settings shared by every run.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Environment activator (`conda`). `None` resolves `$CONDA_EXE`, then `conda`.
    pub activator: Option<PathBuf>,
    /// Trainer program.
    pub trainer: String,
    /// Monitor program.
    pub monitor: String,
    /// Port the monitor listens on.
    pub monitor_port: u16,
    /// Parent of the per-invocation scratch directories.
    pub scratch_root: PathBuf,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            activator: None,
            trainer: "mlagents-learn".to_string(),
            monitor: "tensorboard".to_string(),
            monitor_port: DEFAULT_MONITOR_PORT,
            scratch_root: std::env::temp_dir().join("mentor-cli"),
        }
    }
}

impl Toolchain {
    /// Activator to wrap commands with.
    pub fn resolve_activator(&self) -> PathBuf {
        if let Some(explicit) = &self.activator {
            return explicit.clone();
        }
        match std::env::var_os("CONDA_EXE").map(PathBuf::from) {
            Some(conda) if conda.is_file() => conda,
            _ => PathBuf::from("conda"),
        }
    }

    /// Monitor URL reported for a run, whether or not this service launches it.
    pub fn monitor_url(&self, options: &RunOptions) -> Option<String> {
        options
            .launch_monitor
            .then(|| monitor_url(self.monitor_port))
    }

    /// `<trainer> <args>` or `<activator> run -n <env> <trainer> <args>`.
    pub fn training_command(&self, options: &RunOptions) -> CommandLine {
        let line = self.wrap(options, &self.trainer);
        let mut line = line
            .arg(&options.config_path)
            .joined_arg("--run-id=", options.run_id.as_str())
            .joined_arg("--results-dir=", &options.results_dir)
            .arg("--force");
        if let Some(env) = &options.executable_path {
            line = line.joined_arg("--env=", env);
        }
        if let Some(port) = options.base_port {
            line = line.joined_arg("--base-port=", port.to_string());
        }
        if options.no_graphics {
            line = line.arg("--no-graphics");
        }
        line
    }

    /// `<monitor> --logdir <results> --host localhost --port <port>`, wrapped
    /// like the trainer.
    pub fn monitor_command(&self, options: &RunOptions) -> CommandLine {
        self.wrap(options, &self.monitor)
            .arg("--logdir")
            .arg(&options.results_dir)
            .arg("--host")
            .arg("localhost")
            .arg("--port")
            .arg(self.monitor_port.to_string())
    }

    fn wrap(&self, options: &RunOptions, program: &str) -> CommandLine {
        if options.skip_activation {
            CommandLine::new(program)
        } else {
            CommandLine::new(self.resolve_activator())
                .arg("run")
                .arg("-n")
                .arg(&options.environment_name)
                .arg(program)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_core::RunId;
    use std::ffi::OsStr;

    fn options(skip_activation: bool) -> RunOptions {
        RunOptions {
            executable_path: Some(PathBuf::from("/envs/3DBall.exe")),
            config_path: PathBuf::from("/cfg/ppo.yaml"),
            run_id: RunId::new("r1"),
            results_dir: PathBuf::from("/results"),
            environment_name: "mlagents".to_string(),
            base_port: Some(5005),
            no_graphics: true,
            skip_activation,
            launch_monitor: true,
        }
    }

    fn toolchain() -> Toolchain {
        Toolchain {
            activator: Some(PathBuf::from("/opt/conda/bin/conda")),
            ..Default::default()
        }
    }

    fn args(line: &CommandLine) -> Vec<String> {
        line.args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_wrapped_training_command() {
        let line = toolchain().training_command(&options(false));
        assert_eq!(line.program(), OsStr::new("/opt/conda/bin/conda"));
        assert_eq!(
            args(&line),
            vec![
                "run",
                "-n",
                "mlagents",
                "mlagents-learn",
                "/cfg/ppo.yaml",
                "--run-id=r1",
                "--results-dir=/results",
                "--force",
                "--env=/envs/3DBall.exe",
                "--base-port=5005",
                "--no-graphics",
            ]
        );
    }

    #[test]
    fn test_direct_training_command() {
        let mut opts = options(true);
        opts.executable_path = None;
        opts.base_port = None;
        opts.no_graphics = false;

        let line = toolchain().training_command(&opts);
        assert_eq!(line.program(), OsStr::new("mlagents-learn"));
        assert_eq!(
            args(&line),
            vec!["/cfg/ppo.yaml", "--run-id=r1", "--results-dir=/results", "--force"]
        );
    }

    #[test]
    fn test_monitor_command() {
        let line = toolchain().monitor_command(&options(true));
        assert_eq!(line.program(), OsStr::new("tensorboard"));
        assert_eq!(
            args(&line),
            vec!["--logdir", "/results", "--host", "localhost", "--port", "6006"]
        );
    }

    #[test]
    fn test_monitor_url_only_when_requested() {
        let mut opts = options(true);
        assert_eq!(
            toolchain().monitor_url(&opts).as_deref(),
            Some("http://localhost:6006")
        );
        opts.launch_monitor = false;
        assert_eq!(toolchain().monitor_url(&opts), None);
    }
}
