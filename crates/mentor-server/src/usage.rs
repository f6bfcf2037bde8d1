//! Usage text returned alongside validation errors.

/// Usage of `POST /train`.
pub const TRAINING_USAGE: &str = "\
Usage:
  POST /train {\"envPath\": \"<path-to-env-exe>\", \"config\": \"<trainer-config.yaml>\", ...}

Options:
  runId         Optional run identifier. Default: run-<behavior>-<UTC timestamp>
  resultsDir    Directory to store training artifacts. Default: the server's --results-dir
  condaEnv      Name of the ML-Agents Conda environment. Default: the server's --conda-env
  basePort      Base port to use when launching the environment
  noGraphics    Launches the environment without rendering
  skipConda     Assume the ML-Agents tooling is already on PATH
  tensorboard   Also start TensorBoard pointed at the results directory

Report usage:
  POST /report {\"runId\": \"<id>\", \"resultsDir\": \"<path>\"}";

/// Usage of `POST /report`.
pub const REPORT_USAGE: &str = "\
Usage:
  POST /report {\"runId\": \"<id>\", \"resultsDir\": \"<path>\"}

Options:
  runId         Run identifier to inspect (required)
  resultsDir    Directory that contains run artifacts. Default: the server's --results-dir";
