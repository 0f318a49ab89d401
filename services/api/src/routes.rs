use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use karma_rewards::rewards::{reward_router, RewardService, RewardStore};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_operational_routes<S>(service: Arc<RewardService<S>>) -> axum::Router
where
    S: RewardStore + 'static,
{
    reward_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/version", axum::routing::get(version_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Service build plus the scorer model currently loaded.
pub(crate) async fn version_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "model_version": state.model.version,
        "last_updated": state.model.last_updated,
    }))
}
