pub mod cache;
pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::analytics::handlers as analytics;
use crate::errors::AppError;
use crate::matching::handlers as matching;
use crate::state::AppState;

async fn not_found() -> AppError {
    AppError::NotFound("no such route".to_string())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Analytics API
        .route(
            "/api/v1/analytics/anomalies",
            post(analytics::handle_anomalies),
        )
        .route("/api/v1/analytics/growth", post(analytics::handle_growth))
        .route(
            "/api/v1/analytics/milestones",
            post(analytics::handle_milestones),
        )
        .route(
            "/api/v1/analytics/trajectory",
            post(analytics::handle_trajectory),
        )
        // Matching API
        .route("/api/v1/match/score", post(matching::handle_score))
        .route("/api/v1/match/candidates", post(matching::handle_rank))
        // Cache administration
        .route("/api/v1/cache", delete(cache::handle_invalidate))
        .fallback(not_found)
        .with_state(state)
}
