//! ttscache - cache-first TTS 服务
//!
//! - Domain: cache key, text chunker, stream state
//! - Application: commands, queries, stream, ports
//! - Infrastructure: http, memory, persistence, adapters

use std::sync::Arc;

use ttscache::application::{PcmFormat, StreamSettings, TtsEnginePort};
use ttscache::config::{load_config, print_config, AppConfig, TtsProvider};
use ttscache::infrastructure::adapters::{
    DashScopeConfig, DashScopeTtsClient, FakeTtsClient, WavEncoder,
};
use ttscache::infrastructure::http::{AppState, HttpServer};
use ttscache::infrastructure::memory::ConcurrencyGate;
use ttscache::infrastructure::persistence::{FileAudioCache, FileCacheConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    init_tracing(&config);

    tracing::info!("ttscache - cache-first TTS service");
    print_config(&config);

    // 创建文件缓存
    let cache_config = FileCacheConfig {
        cache_dir: config.cache.dir.clone(),
        extension: config.cache.audio_format.clone(),
    };
    let audio_cache = Arc::new(FileAudioCache::new(&cache_config).await?);

    // 创建 TTS 引擎
    let tts_engine: Arc<dyn TtsEnginePort> = match config.tts.provider {
        TtsProvider::DashScope => {
            let tts_config = DashScopeConfig {
                base_url: config.tts.base_url.clone(),
                api_key: config.tts.api_key.clone(),
                model: config.tts.model.clone(),
                timeout_secs: config.tts.timeout_secs,
            };
            if !config.tts.has_api_key() {
                tracing::warn!("No TTS API key configured, synthesis requests will fail");
            }
            Arc::new(DashScopeTtsClient::new(tts_config)?)
        }
        TtsProvider::Fake => {
            tracing::warn!("Using fake TTS engine");
            Arc::new(FakeTtsClient::default())
        }
    };

    // 一次性与流式接口共用的并发闸门
    let gate = ConcurrencyGate::new(config.limits.max_concurrent_requests);

    let state = AppState::new(
        audio_cache,
        tts_engine,
        Arc::new(WavEncoder::new()),
        gate,
        stream_settings(&config),
        config.server.audio_url_base(),
    );

    let server = HttpServer::new(config.server.addr(), state);

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for ctrl-c");
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},ttscache={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn stream_settings(config: &AppConfig) -> StreamSettings {
    StreamSettings {
        chunk_max_length: config.stream.chunk_max_length,
        queue_capacity: config.stream.queue_capacity,
        synthesize_all_chunks: config.stream.synthesize_all_chunks,
        cache_enabled: config.cache.enabled,
        default_voice: config.tts.default_voice.clone(),
        default_language: config.tts.default_language.clone(),
        limits: config.limits.synthesis_limits(),
        format: PcmFormat::default(),
    }
}
