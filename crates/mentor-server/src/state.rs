//! Shared state for HTTP handlers.

use std::sync::Arc;

use mentor_core::OptionDefaults;
use mentor_runner::RunRegistry;

/// State shared by every request.
pub struct AppState {
    /// Tracked runs.
    pub registry: Arc<RunRegistry>,
    /// Defaults applied while validating start requests.
    pub defaults: OptionDefaults,
}

impl AppState {
    pub fn new(registry: Arc<RunRegistry>, defaults: OptionDefaults) -> Arc<Self> {
        Arc::new(Self { registry, defaults })
    }
}
