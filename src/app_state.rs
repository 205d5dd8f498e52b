//! Application state shared across all handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::config::Config;
use crate::services::Launchpad;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Feature workflows and chain queries
    pub launchpad: Arc<Launchpad>,
    /// Renders the Prometheus exposition for `/metrics`
    pub metrics: PrometheusHandle,
}

impl axum::extract::FromRef<AppState> for Arc<Launchpad> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.launchpad.clone()
    }
}
