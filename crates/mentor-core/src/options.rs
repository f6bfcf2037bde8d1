//! Training requests and their validated form, [`RunOptions`].
//!
//! A [`TrainingRequest`] is what a caller sends; it is validated exactly once
//! into [`RunOptions`], which every downstream component trusts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::RunId;
use crate::layout::absolutize;

/// Conda environment used when the request does not name one.
pub const DEFAULT_ENVIRONMENT_NAME: &str = "mlagents";

/// Trainer config used when the request does not name one.
pub const DEFAULT_CONFIG_PATH: &str = "config/ppo/3DBall.yaml";

/// Run id that clients send as a placeholder. Treated as "no run id".
pub const PLACEHOLDER_RUN_ID: &str = "first3DBallRun";

/// Request to start a training run, as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest {
    #[serde(default, alias = "results_dir")]
    pub results_dir: Option<String>,
    #[serde(default, alias = "conda_env")]
    pub conda_env: Option<String>,
    #[serde(default, alias = "base_port")]
    pub base_port: Option<i64>,
    #[serde(default, alias = "no_graphics")]
    pub no_graphics: Option<bool>,
    #[serde(default, alias = "skip_conda")]
    pub skip_conda: Option<bool>,
    #[serde(default)]
    pub tensorboard: Option<bool>,
    #[serde(default, alias = "env_path")]
    pub env_path: Option<String>,
    #[serde(default)]
    pub config: Option<String>,
    #[serde(default, alias = "run_id")]
    pub run_id: Option<String>,
}

/// Fallback values applied while validating a request.
#[derive(Debug, Clone)]
pub struct OptionDefaults {
    /// Results root used when the request omits `resultsDir`.
    pub results_dir: PathBuf,
    /// Conda environment used when the request omits `condaEnv`.
    pub environment_name: String,
    /// Trainer config used when the request omits `config`.
    pub config_path: PathBuf,
}

impl Default for OptionDefaults {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            environment_name: DEFAULT_ENVIRONMENT_NAME.to_string(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }
}

/// Validated options for one training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Environment build handed to the trainer as `--env`.
    pub executable_path: Option<PathBuf>,
    /// Trainer configuration file. Exists at validation time.
    pub config_path: PathBuf,
    pub run_id: RunId,
    /// Absolute results root; the run writes under `<results_dir>/<run_id>`.
    pub results_dir: PathBuf,
    /// Conda environment the trainer runs in.
    pub environment_name: String,
    pub base_port: Option<u16>,
    pub no_graphics: bool,
    /// Invoke the trainer directly instead of through the activator.
    pub skip_activation: bool,
    /// Start a monitor (TensorBoard) next to the trainer.
    pub launch_monitor: bool,
}

impl RunOptions {
    /// Validate a request into run options.
    ///
    /// The placeholder run id is treated as absent, in which case an id is
    /// derived from the config's first behavior name and the current time.
    pub fn from_request(
        request: &TrainingRequest,
        defaults: &OptionDefaults,
    ) -> Result<Self, CoreError> {
        Self::from_request_at(request, defaults, Utc::now())
    }

    /// Same as [`RunOptions::from_request`] with an explicit clock.
    pub fn from_request_at(
        request: &TrainingRequest,
        defaults: &OptionDefaults,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        let executable_path = match non_blank(request.env_path.as_deref()) {
            Some(path) => Some(existing_file(Path::new(path), "environment executable")?),
            None => None,
        };

        let config_path = match non_blank(request.config.as_deref()) {
            Some(path) => existing_file(Path::new(path), "trainer config")?,
            None => existing_file(&defaults.config_path, "trainer config")?,
        };

        let results_dir = match non_blank(request.results_dir.as_deref()) {
            Some(dir) => resolve_directory(Path::new(dir))?,
            None => resolve_directory(&defaults.results_dir)?,
        };

        let environment_name = match request.conda_env.as_deref() {
            Some(name) => {
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    return Err(CoreError::InvalidOptions(
                        "--conda-env must not be empty.".to_string(),
                    ));
                }
                trimmed.to_string()
            }
            None => defaults.environment_name.clone(),
        };

        let base_port = match request.base_port {
            Some(port) => Some(
                u16::try_from(port)
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| {
                        CoreError::InvalidOptions(
                            "--base-port must be a positive integer.".to_string(),
                        )
                    })?,
            ),
            None => None,
        };

        let run_id = match normalize_requested_run_id(request.run_id.as_deref()) {
            Some(id) => RunId::parse(&id)?,
            None => default_run_id(&config_path, now),
        };

        Ok(Self {
            executable_path,
            config_path,
            run_id,
            results_dir,
            environment_name,
            base_port,
            no_graphics: request.no_graphics.unwrap_or(false),
            skip_activation: request.skip_conda.unwrap_or(false),
            launch_monitor: request.tensorboard.unwrap_or(false),
        })
    }

    /// Directory owned by this run.
    pub fn run_dir(&self) -> PathBuf {
        self.results_dir.join(self.run_id.as_str())
    }
}

/// Trim a caller-supplied run id; blank ids and the placeholder become `None`.
pub fn normalize_requested_run_id(requested: Option<&str>) -> Option<String> {
    let trimmed = non_blank(requested)?;
    if trimmed.eq_ignore_ascii_case(PLACEHOLDER_RUN_ID) {
        return None;
    }
    Some(trimmed.to_string())
}

/// `run-<behavior>-<yyyyMMdd-HHmmss>`, or `run-<timestamp>` without a behavior.
pub fn default_run_id(config_path: &Path, now: DateTime<Utc>) -> RunId {
    let timestamp = now.format("%Y%m%d-%H%M%S");
    match first_behavior_name(config_path) {
        Some(behavior) => RunId::new(format!("run-{behavior}-{timestamp}")),
        None => RunId::new(format!("run-{timestamp}")),
    }
}

/// Slug of the first key under the top-level `behaviors:` block of a trainer
/// config, or `None` if the file is unreadable or has no behaviors.
pub fn first_behavior_name(config_path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(config_path).ok()?;
    let mut behaviors_indent: Option<usize> = None;

    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = indentation(line);

        let Some(block_indent) = behaviors_indent else {
            if trimmed.to_lowercase().starts_with("behaviors:") {
                behaviors_indent = Some(indent);
            }
            continue;
        };

        if indent <= block_indent {
            break;
        }
        let Some(colon) = trimmed.find(':').filter(|idx| *idx > 0) else {
            continue;
        };
        if let Some(slug) = slugify(trimmed[..colon].trim()) {
            return Some(slug);
        }
    }

    None
}

// Tabs count as two columns.
fn indentation(line: &str) -> usize {
    line.chars()
        .map_while(|ch| match ch {
            ' ' => Some(1),
            '\t' => Some(2),
            _ => None,
        })
        .sum()
}

fn slugify(name: &str) -> Option<String> {
    let slug: String = name
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() {
                ch.to_lowercase().next().unwrap_or(ch)
            } else if ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    (!slug.is_empty()).then(|| slug.to_string())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn existing_file(path: &Path, description: &str) -> Result<PathBuf, CoreError> {
    let full = absolutize(path).unwrap_or_else(|_| path.to_path_buf());
    if !full.is_file() {
        return Err(CoreError::FileNotFound {
            description: description.to_string(),
            path: full.display().to_string(),
        });
    }
    Ok(full)
}

fn resolve_directory(path: &Path) -> Result<PathBuf, CoreError> {
    absolutize(path).map_err(|e| CoreError::UnresolvableDirectory {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
