//! Cache Handlers

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::application::{CacheStatsQuery, CheckCacheQuery};
use crate::infrastructure::http::dto::{CheckResponse, StatsResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// `GET /tts/check/:hash`
pub async fn check_cache(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Json<CheckResponse>, ApiError> {
    let result = state.check_cache_handler.handle(CheckCacheQuery { hash }).await?;
    Ok(Json(CheckResponse::from_result(result, &state.audio_url_base)))
}

/// `GET /tts/stats`
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let result = state.cache_stats_handler.handle(CacheStatsQuery).await?;
    Ok(Json(result.into()))
}
