//! Health Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::infrastructure::http::dto::{HealthResponse, RootResponse};
use crate::infrastructure::http::state::AppState;

const SERVICE_NAME: &str = "opus-tts";
const SERVICE_VERSION: &str = "1.0.0";

/// `GET /` 服务标识
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        service: "Opus TTS Service",
        version: SERVICE_VERSION,
        status: "running",
    })
}

/// `GET /tts/health` - 未配置 API Key 时为 degraded
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let connected = state.tts_engine.is_configured();

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" },
        service: SERVICE_NAME,
        version: SERVICE_VERSION,
        dashscope_connected: connected,
    })
}
