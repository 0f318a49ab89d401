use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{RarityTier, RewardDecision};
use super::service::{RewardRequest, RewardService, RewardServiceError};
use super::store::RewardStore;

/// Public shape of a decision returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurpriseBoxResponse {
    pub user_id: String,
    pub surprise_unlocked: bool,
    pub reward_karma: u32,
    pub box_type: Option<String>,
    pub box_name: Option<String>,
    pub rarity: Option<RarityTier>,
    pub status: String,
    pub reason: String,
}

impl From<&RewardDecision> for SurpriseBoxResponse {
    fn from(decision: &RewardDecision) -> Self {
        Self {
            user_id: decision.user_id.clone(),
            surprise_unlocked: decision.granted,
            reward_karma: decision.karma,
            box_type: decision.box_type.clone(),
            box_name: decision.box_name.clone(),
            rarity: decision.rarity,
            status: decision.status.label().to_string(),
            reason: decision.reason.clone(),
        }
    }
}

/// Router builder exposing the decision endpoint and the daily grant listing.
pub fn reward_router<S>(service: Arc<RewardService<S>>) -> Router
where
    S: RewardStore + 'static,
{
    Router::new()
        .route("/check-surprise-box", post(check_handler::<S>))
        .route("/api/v1/rewards/:date", get(rewarded_users_handler::<S>))
        .with_state(service)
}

pub(crate) async fn check_handler<S>(
    State(service): State<Arc<RewardService<S>>>,
    axum::Json(request): axum::Json<RewardRequest>,
) -> Response
where
    S: RewardStore + 'static,
{
    let today = Local::now().date_naive();
    match service.check(&request, today).await {
        Ok(decision) => {
            let body = SurpriseBoxResponse::from(&decision);
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn rewarded_users_handler<S>(
    State(service): State<Arc<RewardService<S>>>,
    Path(date): Path<String>,
) -> Response
where
    S: RewardStore + 'static,
{
    match service.rewarded_users(&date).await {
        Ok(users) => {
            let payload = json!({ "date": date, "user_ids": users });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn error_response(err: RewardServiceError) -> Response {
    match err {
        RewardServiceError::Validation(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        other => {
            error!(error = %other, "reward decision failed");
            let payload = json!({ "error": "processing error" });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
