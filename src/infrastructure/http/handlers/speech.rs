//! Speech Handlers - 一次性合成

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::application::GenerateSpeechCommand;
use crate::infrastructure::http::dto::{GenerateRequest, GenerateResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// `POST /tts/generate`
pub async fn generate_speech(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(req) = payload?;
    let cmd = GenerateSpeechCommand {
        text: req.text,
        voice: req.voice.unwrap_or_else(|| state.default_voice().to_string()),
        language: req.language.unwrap_or_else(|| state.default_language().to_string()),
        speed: req.speed,
    };

    let result = state.generate_speech_handler.handle(cmd).await?;

    Ok(Json(GenerateResponse::from_result(result, &state.audio_url_base)))
}
