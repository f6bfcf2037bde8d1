//! Core domain errors.

use thiserror::Error;

/// Core domain errors for Mentor.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced file does not exist.
    #[error("Could not find the specified {description} at '{path}'.")]
    FileNotFound { description: String, path: String },

    /// A directory path could not be resolved to an absolute path.
    #[error("Failed to resolve directory path '{path}': {reason}")]
    UnresolvableDirectory { path: String, reason: String },

    /// Invalid option value.
    #[error("{0}")]
    InvalidOptions(String),
}
