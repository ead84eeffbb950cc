//! Application state shared by the service-level handlers

use std::sync::Arc;

use crate::{activity::ActivityLogger, config::Config};

/// State for health and readiness handlers
///
/// Resource routes carry their own controller state; this only holds what
/// the service as a whole reports on.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    activity: ActivityLogger,
}

impl AppState {
    /// Wrap the configuration and the activity handle
    pub fn new(config: Config, activity: ActivityLogger) -> Self {
        Self {
            config: Arc::new(config),
            activity,
        }
    }

    /// Service configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Activity queue, reported by readiness
    pub fn activity(&self) -> &ActivityLogger {
        &self.activity
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Config::default(), ActivityLogger::disabled())
    }
}
