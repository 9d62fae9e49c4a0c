//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::application::{CacheMetadata, CacheStatsResponse, CheckCacheResponse, GenerateSpeechResponse};
use crate::domain::CacheKey;

// ============================================================================
// Generate
// ============================================================================

/// `POST /tts/generate` 请求体
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub text: String,
    /// 缺省时使用 `tts.default_voice`
    #[serde(default)]
    pub voice: Option<String>,
    /// 缺省时使用 `tts.default_language`
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_speed() -> f64 {
    1.0
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub cached: bool,
    pub hash: String,
    pub url: String,
    pub file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl GenerateResponse {
    pub fn from_result(result: GenerateSpeechResponse, url_base: &str) -> Self {
        Self {
            success: true,
            cached: result.cached,
            url: audio_url(url_base, &result.hash),
            hash: result.hash.to_string(),
            file_size: result.file_size,
            duration: result.duration,
        }
    }
}

// ============================================================================
// Cache
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CacheMetadata>,
}

impl CheckResponse {
    pub fn from_result(result: CheckCacheResponse, url_base: &str) -> Self {
        Self {
            exists: result.exists,
            url: result.hash.as_ref().map(|hash| audio_url(url_base, hash)),
            file_size: result.file_size,
            metadata: result.metadata,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub cache_dir: String,
}

impl From<CacheStatsResponse> for StatsResponse {
    fn from(stats: CacheStatsResponse) -> Self {
        Self {
            total_files: stats.total_files,
            total_size_bytes: stats.total_size_bytes,
            total_size_mb: stats.total_size_mb(),
            cache_dir: stats.cache_dir.display().to_string(),
        }
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` 或 `degraded`（未配置 API Key）
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub dashscope_connected: bool,
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

/// 缓存音频的访问地址
pub fn audio_url(url_base: &str, hash: &CacheKey) -> String {
    format!("{}/audio/{}.wav", url_base, hash)
}
