use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::Result;
use crate::handlers::response::ApiResponse;
use crate::services::WalletInfo;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub environment: String,
}

impl HealthStatus {
    pub fn new(environment: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: environment.to_string(),
        }
    }
}

/// Basic health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus::new(&state.config.environment))
}

/// Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}

/// Connected wallet and its SOL balance
/// GET /api/v1/wallet
pub async fn wallet_info(State(state): State<AppState>) -> Result<Json<ApiResponse<WalletInfo>>> {
    let info = state.launchpad.wallet_info().await?;
    Ok(Json(ApiResponse::success(info)))
}
