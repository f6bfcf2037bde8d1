//! Durable resume record of a run.
//!
//! Written once under `<run>/run_logs/run_metadata.json` before the trainer
//! is spawned and read back only by recovery. The key names are shared with
//! documents written by earlier service lifetimes.

use std::fs;
use std::path::{Path, PathBuf};

use mentor_core::layout::{METADATA_FILE, RUN_LOGS_DIR};
use mentor_core::{RunId, RunOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RunnerError;

/// Snapshot of [`RunOptions`] sufficient to relaunch a run identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    #[serde(default)]
    pub env_path: Option<PathBuf>,
    pub config_path: PathBuf,
    pub run_id: RunId,
    pub results_directory: PathBuf,
    pub conda_environment_name: String,
    #[serde(default)]
    pub base_port: Option<u16>,
    #[serde(default)]
    pub no_graphics: bool,
    #[serde(default)]
    pub skip_conda: bool,
    #[serde(default)]
    pub launch_tensorboard: bool,
}

impl RunMetadata {
    pub fn from_options(options: &RunOptions) -> Self {
        Self {
            env_path: options.executable_path.clone(),
            config_path: options.config_path.clone(),
            run_id: options.run_id.clone(),
            results_directory: options.results_dir.clone(),
            conda_environment_name: options.environment_name.clone(),
            base_port: options.base_port,
            no_graphics: options.no_graphics,
            skip_conda: options.skip_activation,
            launch_tensorboard: options.launch_monitor,
        }
    }

    pub fn into_options(self) -> RunOptions {
        RunOptions {
            executable_path: self.env_path,
            config_path: self.config_path,
            run_id: self.run_id,
            results_dir: self.results_directory,
            environment_name: self.conda_environment_name,
            base_port: self.base_port,
            no_graphics: self.no_graphics,
            skip_activation: self.skip_conda,
            launch_monitor: self.launch_tensorboard,
        }
    }

    pub fn path_in(run_directory: &Path) -> PathBuf {
        run_directory.join(RUN_LOGS_DIR).join(METADATA_FILE)
    }

    /// Write the metadata for `options` under `run_directory`.
    ///
    /// The document is written to a temporary sibling and renamed into place
    /// so a crash never leaves a truncated file behind.
    pub fn save(run_directory: &Path, options: &RunOptions) -> Result<PathBuf, RunnerError> {
        let path = Self::path_in(run_directory);
        let logs_dir = run_directory.join(RUN_LOGS_DIR);
        fs::create_dir_all(&logs_dir).map_err(|source| RunnerError::CreateDir {
            path: logs_dir.display().to_string(),
            source,
        })?;

        let json = serde_json::to_string_pretty(&Self::from_options(options))?;
        let tmp = path.with_extension("json.tmp");
        let write = fs::write(&tmp, json).and_then(|()| fs::rename(&tmp, &path));
        write.map_err(|source| RunnerError::Metadata {
            path: path.display().to_string(),
            source,
        })?;

        debug!(run_id = %options.run_id, path = %path.display(), "Run metadata saved");
        Ok(path)
    }

    /// Load the metadata stored under `run_directory`.
    ///
    /// Returns `None` when the document is absent, unreadable, not valid JSON
    /// or missing a required field. Absence means "nothing to recover".
    pub fn try_load(run_directory: &Path) -> Option<Self> {
        let path = Self::path_in(run_directory);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Run metadata not readable");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Run metadata is malformed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_options(root: &Path) -> RunOptions {
        RunOptions {
            executable_path: Some(root.join("env/3DBall.exe")),
            config_path: root.join("config.yaml"),
            run_id: RunId::new("run-a"),
            results_dir: root.to_path_buf(),
            environment_name: "mlagents".to_string(),
            base_port: Some(5005),
            no_graphics: true,
            skip_activation: false,
            launch_monitor: true,
        }
    }

    #[test]
    fn test_save_then_load_preserves_every_field() {
        let temp = TempDir::new().unwrap();
        let options = sample_options(temp.path());
        let run_dir = options.run_dir();

        let path = RunMetadata::save(&run_dir, &options).unwrap();
        assert!(path.ends_with("run_logs/run_metadata.json"));

        let loaded = RunMetadata::try_load(&run_dir).unwrap();
        assert_eq!(loaded.into_options(), options);
    }

    #[test]
    fn test_document_uses_camel_case_keys() {
        let temp = TempDir::new().unwrap();
        let options = sample_options(temp.path());
        let path = RunMetadata::save(&options.run_dir(), &options).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        for key in [
            "envPath",
            "configPath",
            "runId",
            "resultsDirectory",
            "condaEnvironmentName",
            "basePort",
            "noGraphics",
            "skipConda",
            "launchTensorboard",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
    }

    #[test]
    fn test_missing_optional_fields_use_defaults() {
        let temp = TempDir::new().unwrap();
        let logs = temp.path().join("run_logs");
        fs::create_dir_all(&logs).unwrap();
        fs::write(
            logs.join("run_metadata.json"),
            r#"{"configPath":"/c.yaml","runId":"r","resultsDirectory":"/res","condaEnvironmentName":"ml"}"#,
        )
        .unwrap();

        let loaded = RunMetadata::try_load(temp.path()).unwrap();
        assert_eq!(loaded.env_path, None);
        assert_eq!(loaded.base_port, None);
        assert!(!loaded.no_graphics && !loaded.skip_conda && !loaded.launch_tensorboard);
    }

    #[test]
    fn test_missing_required_field_or_bad_json_is_absent() {
        let temp = TempDir::new().unwrap();
        let logs = temp.path().join("run_logs");
        fs::create_dir_all(&logs).unwrap();

        fs::write(
            logs.join("run_metadata.json"),
            r#"{"configPath":"/c.yaml","runId":"r","resultsDirectory":"/res"}"#,
        )
        .unwrap();
        assert!(RunMetadata::try_load(temp.path()).is_none());

        fs::write(logs.join("run_metadata.json"), "{not json").unwrap();
        assert!(RunMetadata::try_load(temp.path()).is_none());
    }

    #[test]
    fn test_absent_document_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(RunMetadata::try_load(temp.path()).is_none());
    }
}
