//! Application State
//!
//! 包含所有 Command/Query Handlers 与流式会话共享上下文

use std::sync::Arc;

use crate::application::{
    // Command handlers
    GenerateSpeechHandler,
    // Query handlers
    CacheStatsHandler, CheckCacheHandler,
    // Stream
    StreamContext, StreamSettings,
    // Ports
    AudioCachePort, AudioEncoderPort, TtsEnginePort,
};
use crate::infrastructure::memory::ConcurrencyGate;

/// 应用状态
///
/// 一次性接口与流式接口共用同一个 [`ConcurrencyGate`]
pub struct AppState {
    // ========== Ports ==========
    pub audio_cache: Arc<dyn AudioCachePort>,
    pub tts_engine: Arc<dyn TtsEnginePort>,

    // ========== Command Handlers ==========
    pub generate_speech_handler: GenerateSpeechHandler,

    // ========== Query Handlers ==========
    pub check_cache_handler: CheckCacheHandler,
    pub cache_stats_handler: CacheStatsHandler,

    // ========== Stream ==========
    pub stream_context: Arc<StreamContext>,

    /// 音频 URL 前缀（空串表示返回相对路径）
    pub audio_url_base: String,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        audio_cache: Arc<dyn AudioCachePort>,
        tts_engine: Arc<dyn TtsEnginePort>,
        encoder: Arc<dyn AudioEncoderPort>,
        gate: ConcurrencyGate,
        settings: StreamSettings,
        audio_url_base: impl Into<String>,
    ) -> Self {
        Self {
            // Ports
            audio_cache: audio_cache.clone(),
            tts_engine: tts_engine.clone(),

            // Command handlers
            generate_speech_handler: GenerateSpeechHandler::new(
                audio_cache.clone(),
                tts_engine.clone(),
                encoder.clone(),
                gate.clone(),
                settings.limits,
            ),

            // Query handlers
            check_cache_handler: CheckCacheHandler::new(audio_cache.clone()),
            cache_stats_handler: CacheStatsHandler::new(audio_cache.clone()),

            stream_context: Arc::new(StreamContext {
                tts_engine,
                audio_cache,
                encoder,
                gate,
                settings,
            }),
            audio_url_base: audio_url_base.into(),
        }
    }

    pub fn default_voice(&self) -> &str {
        &self.stream_context.settings.default_voice
    }

    pub fn default_language(&self) -> &str {
        &self.stream_context.settings.default_language
    }
}
