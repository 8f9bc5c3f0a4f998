//! HTTP handlers and the state they share.

pub mod health;
pub mod validate;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use validate::{validate_csv_handler, ValidateRequest};

use std::sync::Arc;
use std::time::Instant;

use super::ShutdownController;
use crate::service::ValidationOrchestrator;

/// State passed to every handler via `State` extraction.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ValidationOrchestrator>,
    /// Health state and in-flight validation tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Used for uptime reporting.
    pub start_time: Instant,
}

#[cfg(test)]
pub(crate) fn test_state(config: crate::service::ValidationConfig) -> AppState {
    let schema = csvcheck_core::claims::claims_schema().unwrap();
    let profile = csvcheck_core::claims::claims_profile(&schema);
    AppState {
        orchestrator: Arc::new(ValidationOrchestrator::new(
            Arc::new(schema),
            Arc::new(profile),
            config,
        )),
        shutdown: Arc::new(ShutdownController::new()),
        start_time: Instant::now(),
    }
}
