//! System endpoints: health check and randomness defaults.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::RandomnessDto;
use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    arisans: usize,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp and the number of live arisans.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            arisans: state.arisan_service.count().await,
        }),
    )
}

/// `GET /config/randomness` — Default randomness coordinates.
#[utoipa::path(
    get,
    path = "/config/randomness",
    tag = "System",
    summary = "Default randomness coordinates",
    description = "Returns the coordinates applied to arisans created without explicit randomness settings.",
    responses(
        (status = 200, description = "Default coordinates", body = RandomnessDto),
    )
)]
pub async fn randomness_defaults_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(RandomnessDto::from(
        state.arisan_service.default_randomness(),
    ))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/randomness", get(randomness_defaults_handler))
}
