use axum::{extract::State, Extension, Json};

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{RecommendationRequest, RecommendationResponse},
    routes::AppState,
};

/// Handler for the recommendations endpoint
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    tracing::info!(
        request_id = %request_id,
        user_present = request.user_id.is_some(),
        age_group = ?request.age_group,
        exclude_downloaded = request.exclude_downloaded,
        "Processing recommendation request"
    );

    let response = state.recommender.recommend(request).await?;

    tracing::info!(
        request_id = %request_id,
        strategy = %response.strategy_used,
        returned = response.items.len(),
        "Recommendation request completed"
    );

    Ok(Json(response))
}
