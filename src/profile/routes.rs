//! HTTP routes for the profile API.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::auth::bearer_token;
use crate::error::AppError;
use crate::insights::model::IndustryInsight;
use crate::profile::model::{OnboardingStatus, ProfileUpdate, User};
use crate::profile::service::ProfileService;

/// Shared state for profile routes.
#[derive(Clone)]
pub struct ProfileRouteState {
    pub service: Arc<ProfileService>,
}

/// PUT /api/profile — update the caller's profile.
async fn update_profile(
    State(state): State<ProfileRouteState>,
    headers: HeaderMap,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    let user = state
        .service
        .update_profile(bearer_token(&headers), update)
        .await?;
    Ok(Json(user))
}

/// GET /api/profile — fetch the caller's profile.
async fn get_profile(
    State(state): State<ProfileRouteState>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    let user = state.service.get_profile(bearer_token(&headers)).await?;
    Ok(Json(user))
}

/// GET /api/onboarding/status — whether the caller has picked an industry.
async fn onboarding_status(
    State(state): State<ProfileRouteState>,
    headers: HeaderMap,
) -> Result<Json<OnboardingStatus>, AppError> {
    let status = state
        .service
        .onboarding_status(bearer_token(&headers))
        .await?;
    Ok(Json(status))
}

/// GET /api/insights — the insight row for the caller's industry.
async fn industry_insight(
    State(state): State<ProfileRouteState>,
    headers: HeaderMap,
) -> Result<Json<IndustryInsight>, AppError> {
    let insight = state
        .service
        .industry_insight(bearer_token(&headers))
        .await?;
    Ok(Json(insight))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "careerwise"
    }))
}

/// Build the profile router.
pub fn profile_routes(state: ProfileRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/profile", put(update_profile).get(get_profile))
        .route("/api/onboarding/status", get(onboarding_status))
        .route("/api/insights", get(industry_insight))
        .with_state(state)
}
