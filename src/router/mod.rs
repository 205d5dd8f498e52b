//! Router configuration module - RESTful v1 API

use axum::{
    middleware::from_fn,
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::app_state::AppState;
use crate::handlers::{approvals, health, pools, tokens};
use crate::middleware::metrics_middleware;

/// Build the application router.
pub fn build_router(app_state: AppState) -> Router {
    let request_timeout = Duration::from_secs(app_state.config.request_timeout);

    let v1_api = Router::new()
        .route("/wallet", get(health::wallet_info))
        .route("/tokens", post(tokens::launch_token))
        .route("/tokens/{mint}", get(tokens::get_token_info))
        .route("/tokens/{mint}/mint", post(tokens::mint_tokens))
        .route("/tokens/{mint}/transfer", post(tokens::transfer_tokens))
        .route("/tokens/{mint}/metadata/uri", put(tokens::update_metadata_uri))
        .route("/pools", post(pools::create_pool))
        .route("/approvals", get(approvals::list_approvals))
        .route("/approvals/{id}/approve", post(approvals::approve))
        .route("/approvals/{id}/reject", post(approvals::reject));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::prometheus_metrics))
        .nest("/api/v1", v1_api)
        .route_layer(from_fn(metrics_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    axum::http::StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}
