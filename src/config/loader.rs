//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, TtsProvider};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// API Key 的后备环境变量（按顺序查找）
const API_KEY_FALLBACK_VARS: &[&str] = &["DASHSCOPE_API_KEY", "OPENAI_API_KEY"];

/// 支持的音频容器格式
const SUPPORTED_AUDIO_FORMATS: &[&str] = &["wav"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `TTSCACHE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// 调用前先加载 `.env`（如果存在）
///
/// # 环境变量示例
/// - `TTSCACHE_SERVER__PORT=8000`
/// - `TTSCACHE_TTS__API_KEY=sk-...`
/// - `TTSCACHE_CACHE__DIR=/data/audio`
/// - `TTSCACHE_LIMITS__MAX_CONCURRENT_REQUESTS=10`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(ConfigError::LoadError(format!("Failed to read .env: {}", e)));
        }
    }

    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("tts.provider", "dashscope")?
        .set_default("tts.base_url", "https://dashscope.aliyuncs.com/api/v1")?
        .set_default("tts.api_key", "")?
        .set_default("tts.model", "qwen3-tts-flash")?
        .set_default("tts.timeout_secs", 30)?
        .set_default("tts.default_voice", "Cherry")?
        .set_default("tts.default_language", "en-US")?
        .set_default("cache.dir", "data/audio")?
        .set_default("cache.audio_format", "wav")?
        .set_default("cache.enabled", true)?
        .set_default("limits.max_concurrent_requests", 5)?
        .set_default("limits.min_text_length", 1)?
        .set_default("limits.max_text_length", 500)?
        .set_default("limits.min_speed", 0.5)?
        .set_default("limits.max_speed", 2.0)?
        .set_default("stream.chunk_max_length", 500)?
        .set_default("stream.queue_capacity", 64)?
        .set_default("stream.synthesize_all_chunks", false)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: TTSCACHE_TTS__BASE_URL=https://dashscope-intl.aliyuncs.com/api/v1
    builder = builder.add_source(
        Environment::with_prefix("TTSCACHE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let mut app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    resolve_api_key(&mut app_config, |name| std::env::var(name).ok());

    validate_config(&app_config)?;

    Ok(app_config)
}

/// `tts.api_key` 为空时从后备环境变量读取
fn resolve_api_key(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if config.tts.has_api_key() {
        return;
    }
    if let Some(key) = API_KEY_FALLBACK_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.trim().is_empty())
    {
        config.tts.api_key = key.trim().to_string();
    }
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.server.port == 0 {
        return invalid("Server port cannot be 0");
    }

    if config.cache.dir.as_os_str().is_empty() {
        return invalid("Cache directory cannot be empty");
    }

    if !SUPPORTED_AUDIO_FORMATS.contains(&config.cache.audio_format.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "Unsupported audio format: {} (supported: {})",
            config.cache.audio_format,
            SUPPORTED_AUDIO_FORMATS.join(", ")
        )));
    }

    if config.tts.provider == TtsProvider::DashScope && config.tts.base_url.is_empty() {
        return invalid("TTS base URL cannot be empty");
    }

    if config.limits.max_concurrent_requests == 0 {
        return invalid("max_concurrent_requests must be at least 1");
    }

    if config.limits.max_text_length == 0 {
        return invalid("max_text_length must be at least 1");
    }

    if config.limits.min_text_length > config.limits.max_text_length {
        return invalid("min_text_length cannot exceed max_text_length");
    }

    if config.limits.min_speed > config.limits.max_speed {
        return invalid("min_speed cannot exceed max_speed");
    }

    if config.stream.chunk_max_length == 0 {
        return invalid("chunk_max_length must be at least 1");
    }

    if config.stream.queue_capacity == 0 {
        return invalid("queue_capacity must be at least 1");
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志，不输出 API Key）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    if let Some(url) = &config.server.public_base_url {
        tracing::info!("Public Base URL: {}", url);
    }
    tracing::info!("TTS Provider: {:?}", config.tts.provider);
    tracing::info!("TTS Base URL: {}", config.tts.base_url);
    tracing::info!("TTS Model: {}", config.tts.model);
    tracing::info!("TTS Timeout: {}s", config.tts.timeout_secs);
    tracing::info!("TTS API Key Configured: {}", config.tts.has_api_key());
    tracing::info!(
        "Defaults: voice={}, language={}",
        config.tts.default_voice,
        config.tts.default_language
    );
    tracing::info!("Cache Directory: {:?}", config.cache.dir);
    tracing::info!("Audio Format: {}", config.cache.audio_format);
    tracing::info!("Max Concurrent Requests: {}", config.limits.max_concurrent_requests);
    tracing::info!(
        "Stream: chunk_max_length={}, synthesize_all_chunks={}",
        config.stream.chunk_max_length,
        config.stream.synthesize_all_chunks
    );
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
