//! HTTP request handlers.

mod health;
mod report;
mod training;

pub use health::health_check;
pub use report::report;
pub use training::{cancel_training, start_training, training_status};
