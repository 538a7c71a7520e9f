use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InvalidateQuery {
    pub pattern: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    /// Entries removed; absent when the whole cache was cleared.
    pub removed: Option<usize>,
    pub cleared: bool,
}

/// DELETE /api/v1/cache?pattern=..|tag=..
/// With neither parameter the whole cache is cleared.
pub async fn handle_invalidate(
    State(state): State<AppState>,
    Query(params): Query<InvalidateQuery>,
) -> Result<Json<InvalidateResponse>, AppError> {
    let response = match (params.pattern, params.tag) {
        (Some(_), Some(_)) => {
            return Err(AppError::Validation(
                "pass either pattern or tag, not both".to_string(),
            ))
        }
        (Some(pattern), None) => {
            if pattern.is_empty() {
                return Err(AppError::Validation("pattern must not be empty".to_string()));
            }
            let removed = state.cache.store().invalidate(&pattern).await;
            info!(pattern = %pattern, removed, "Cache invalidated by pattern");
            InvalidateResponse { removed: Some(removed), cleared: false }
        }
        (None, Some(tag)) => {
            let removed = state.cache.store().invalidate_tag(&tag).await;
            info!(tag = %tag, removed, "Cache invalidated by tag");
            InvalidateResponse { removed: Some(removed), cleared: false }
        }
        (None, None) => {
            state.cache.store().clear().await;
            info!("Cache cleared");
            InvalidateResponse { removed: None, cleared: true }
        }
    };
    Ok(Json(response))
}
