//! Mentor Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Subprocess management
//! - HTTP
//! - Runtime specifics
//!
//! Everything here describes what a training run *is*: its identifier,
//! its validated options, where its files live and how a reported status
//! is normalized.

pub mod error;
pub mod ids;
pub mod layout;
pub mod options;
pub mod status;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::RunId;
pub use layout::RunLayout;
pub use options::{OptionDefaults, RunOptions, TrainingRequest};
pub use status::RunStatus;
