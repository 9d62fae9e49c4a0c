//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

use crate::application::SynthesisLimits;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 合成服务配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// 请求参数范围与并发限制
    #[serde(default)]
    pub limits: LimitsConfig,

    /// 流式接口配置
    #[serde(default)]
    pub stream: StreamConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 公开访问的 Base URL，设置后音频 URL 使用绝对地址，否则返回 `/audio/...` 相对路径
    #[serde(default)]
    pub public_base_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: None,
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 音频 URL 前缀（不带结尾 `/`），未配置时为空串
    pub fn audio_url_base(&self) -> String {
        self.public_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_default()
    }
}

/// 合成服务提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    /// 阿里云 DashScope
    #[default]
    DashScope,
    /// 进程内假实现（本地开发）
    Fake,
}

/// 合成服务配置
#[derive(Clone, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub provider: TtsProvider,

    /// API 基础 URL
    #[serde(default = "default_tts_base_url")]
    pub base_url: String,

    /// API Key，为空时依次读取 `DASHSCOPE_API_KEY`、`OPENAI_API_KEY`
    #[serde(default)]
    pub api_key: String,

    /// 模型名
    #[serde(default = "default_tts_model")]
    pub model: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// 默认音色
    #[serde(default = "default_voice")]
    pub default_voice: String,

    /// 默认语言
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_tts_base_url() -> String {
    "https://dashscope.aliyuncs.com/api/v1".to_string()
}

fn default_tts_model() -> String {
    "qwen3-tts-flash".to_string()
}

fn default_tts_timeout() -> u64 {
    30
}

fn default_voice() -> String {
    "Cherry".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: TtsProvider::default(),
            base_url: default_tts_base_url(),
            api_key: String::new(),
            model: default_tts_model(),
            timeout_secs: default_tts_timeout(),
            default_voice: default_voice(),
            default_language: default_language(),
        }
    }
}

impl std::fmt::Debug for TtsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtsConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("default_voice", &self.default_voice)
            .field("default_language", &self.default_language)
            .finish()
    }
}

impl TtsConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// 缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 缓存目录
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// 音频容器格式（目前只支持 wav）
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// 流式接口是否写缓存
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/audio")
}

fn default_audio_format() -> String {
    "wav".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            audio_format: default_audio_format(),
            enabled: true,
        }
    }
}

/// 限制配置
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// 同时进行中的合成调用上限（一次性与流式共用）
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,

    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    #[serde(default = "default_min_speed")]
    pub min_speed: f64,

    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
}

fn default_max_concurrent() -> usize {
    5
}

fn default_min_text_length() -> usize {
    1
}

fn default_max_text_length() -> usize {
    500
}

fn default_min_speed() -> f64 {
    0.5
}

fn default_max_speed() -> f64 {
    2.0
}

impl LimitsConfig {
    /// 请求参数范围
    pub fn synthesis_limits(&self) -> SynthesisLimits {
        SynthesisLimits {
            min_text_length: self.min_text_length,
            max_text_length: self.max_text_length,
            min_speed: self.min_speed,
            max_speed: self.max_speed,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            min_text_length: default_min_text_length(),
            max_text_length: default_max_text_length(),
            min_speed: default_min_speed(),
            max_speed: default_max_speed(),
        }
    }
}

/// 流式接口配置
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// 每块最大字符数
    #[serde(default = "default_chunk_max_length")]
    pub chunk_max_length: usize,

    /// 片段队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 是否合成所有分块（默认只合成第一块）
    #[serde(default)]
    pub synthesize_all_chunks: bool,
}

fn default_chunk_max_length() -> usize {
    500
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_max_length: default_chunk_max_length(),
            queue_capacity: default_queue_capacity(),
            synthesize_all_chunks: false,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
