use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    cached,
    db::CacheKey,
    error::AppResult,
    models::ContentItem,
    routes::AppState,
};

const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
}

/// Handler for catalog browsing by character name
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Vec<ContentItem>>> {
    let items = match &state.cache {
        Some(cache) => {
            let key = CacheKey::Search(params.q.clone());
            let result: AppResult<Vec<ContentItem>> =
                cached!(cache, key, SEARCH_CACHE_TTL, state.catalog.search(&params.q));
            result?
        }
        None => state.catalog.search(&params.q).await?,
    };

    Ok(Json(items))
}
