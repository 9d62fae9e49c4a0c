//! Speech Command Handlers - cache-first 一次性合成

use std::sync::Arc;

use crate::application::commands::speech_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    AudioCachePort, AudioEncoderPort, NewCacheMetadata, PcmFormat, SynthesisRequest, TtsEnginePort,
};
use crate::domain::CacheKey;
use crate::infrastructure::memory::{ConcurrencyGate, KeyedLocks};

/// GenerateSpeech Handler
///
/// 流程：计算 key → 缓存命中直接返回 → 按 key 加锁并复查缓存 → 获取闸门许可 → 合成 → 封装 → 写缓存
pub struct GenerateSpeechHandler {
    audio_cache: Arc<dyn AudioCachePort>,
    tts_engine: Arc<dyn TtsEnginePort>,
    encoder: Arc<dyn AudioEncoderPort>,
    gate: ConcurrencyGate,
    locks: Arc<KeyedLocks>,
    limits: SynthesisLimits,
}

impl GenerateSpeechHandler {
    pub fn new(
        audio_cache: Arc<dyn AudioCachePort>,
        tts_engine: Arc<dyn TtsEnginePort>,
        encoder: Arc<dyn AudioEncoderPort>,
        gate: ConcurrencyGate,
        limits: SynthesisLimits,
    ) -> Self {
        Self {
            audio_cache,
            tts_engine,
            encoder,
            gate,
            locks: Arc::new(KeyedLocks::new()),
            limits,
        }
    }

    pub async fn handle(&self, cmd: GenerateSpeechCommand) -> Result<GenerateSpeechResponse, ApplicationError> {
        let cmd = self.limits.validate(cmd)?;
        let key = CacheKey::derive(&cmd.text, &cmd.voice, &cmd.language, cmd.speed);

        tracing::info!(
            hash = %key,
            text_len = cmd.text.chars().count(),
            voice = %cmd.voice,
            language = %cmd.language,
            speed = cmd.speed,
            "TTS generate request"
        );

        if let Some(hit) = self.cached(&key).await? {
            tracing::info!(hash = %key, file_size = hit.file_size, "Cache hit");
            return Ok(hit);
        }

        // 同一个 key 同时只合成一次，等锁的请求拿到锁后复查缓存
        let _key_guard = self.locks.lock(&key).await;
        if let Some(hit) = self.cached(&key).await? {
            tracing::info!(hash = %key, "Cache filled by concurrent request");
            return Ok(hit);
        }

        tracing::info!(hash = %key, "Cache miss, synthesizing");

        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ApplicationError::internal(e.to_string()))?;

        let request = SynthesisRequest {
            text: cmd.text.clone(),
            voice: cmd.voice.clone(),
            language: cmd.language.clone(),
            speed: cmd.speed,
        };
        let pcm = self.tts_engine.synthesize(&request).await.map_err(|e| {
            tracing::error!(hash = %key, error = %e, "Synthesis failed");
            ApplicationError::from(e)
        })?;

        let format = PcmFormat::default();
        let asset = self.encoder.encode(&pcm, &format)?;

        let metadata = NewCacheMetadata {
            text: cmd.text,
            voice: cmd.voice,
            language: cmd.language,
            speed: cmd.speed,
        };
        self.audio_cache.save(&key, &asset, Some(metadata)).await?;

        let duration = format.duration_secs(pcm.len());
        tracing::info!(
            hash = %key,
            file_size = asset.len(),
            duration_secs = duration,
            "TTS generated"
        );

        Ok(GenerateSpeechResponse {
            cached: false,
            hash: key,
            file_size: asset.len() as u64,
            duration: Some(duration),
        })
    }

    async fn cached(&self, key: &CacheKey) -> Result<Option<GenerateSpeechResponse>, ApplicationError> {
        if !self.audio_cache.exists(key).await {
            return Ok(None);
        }
        let file_size = self.audio_cache.size_of(key).await?;
        Ok(Some(GenerateSpeechResponse {
            cached: true,
            hash: key.clone(),
            file_size,
            duration: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::{FakeTtsClient, FakeTtsClientConfig, WavEncoder};
    use crate::infrastructure::persistence::{FileAudioCache, FileCacheConfig};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        cache: Arc<FileAudioCache>,
        engine: FakeTtsClient,
        handler: Arc<GenerateSpeechHandler>,
    }

    async fn fixture(engine_config: FakeTtsClientConfig, capacity: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(
            FileAudioCache::new(&FileCacheConfig {
                cache_dir: dir.path().to_path_buf(),
                extension: "wav".to_string(),
            })
            .await
            .unwrap(),
        );
        let engine = FakeTtsClient::new(engine_config);
        let handler = Arc::new(GenerateSpeechHandler::new(
            cache.clone(),
            Arc::new(engine.clone()),
            Arc::new(WavEncoder::new()),
            ConcurrencyGate::new(capacity),
            SynthesisLimits::default(),
        ));
        Fixture {
            _dir: dir,
            cache,
            engine,
            handler,
        }
    }

    fn quick_engine() -> FakeTtsClientConfig {
        FakeTtsClientConfig {
            fragments: 4,
            fragment_bytes: 4800,
            fragment_delay: Duration::from_millis(1),
            fail_at_fragment: None,
        }
    }

    fn cmd(text: &str) -> GenerateSpeechCommand {
        GenerateSpeechCommand {
            text: text.to_string(),
            voice: "Cherry".to_string(),
            language: "en-US".to_string(),
            speed: 1.0,
        }
    }

    #[tokio::test]
    async fn test_second_call_is_cached_with_same_hash() {
        let fx = fixture(quick_engine(), 5).await;

        let first = fx.handler.handle(cmd("Hello")).await.unwrap();
        let second = fx.handler.handle(cmd("Hello")).await.unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.hash, second.hash);
        assert_eq!(first.hash.as_str(), "297fabe95b9163ed693086f8f6a5ccf0");
        assert_eq!(first.file_size, second.file_size);
        assert_eq!(first.file_size, 44 + 4 * 4800);
        assert_eq!(fx.engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_fresh_audio_reports_duration_and_metadata() {
        let fx = fixture(quick_engine(), 5).await;

        let response = fx.handler.handle(cmd("Hello")).await.unwrap();
        let duration = response.duration.unwrap();
        assert!((duration - 0.4).abs() < 1e-9);

        let metadata = fx.cache.metadata(&response.hash).await.unwrap();
        assert_eq!(metadata.text, "Hello");
        assert_eq!(metadata.voice, "Cherry");
        assert_eq!(metadata.hash, response.hash.as_str());
    }

    #[tokio::test]
    async fn test_text_is_trimmed_before_hashing() {
        let fx = fixture(quick_engine(), 5).await;

        let a = fx.handler.handle(cmd("  Hello  ")).await.unwrap();
        let b = fx.handler.handle(cmd("Hello")).await.unwrap();
        assert_eq!(a.hash, b.hash);
        assert!(b.cached);
    }

    #[tokio::test]
    async fn test_validation_has_no_side_effects() {
        let fx = fixture(quick_engine(), 5).await;

        let mut bad_speed = cmd("Hello");
        bad_speed.speed = 3.0;

        for command in [cmd("   "), cmd(&"x".repeat(501)), bad_speed] {
            let err = fx.handler.handle(command).await.unwrap_err();
            assert!(matches!(err, ApplicationError::ValidationError(_)));
        }
        assert_eq!(fx.engine.calls(), 0);
        assert_eq!(fx.cache.stats().await.unwrap().file_count, 0);
    }

    #[tokio::test]
    async fn test_provider_failure_caches_nothing() {
        let fx = fixture(
            FakeTtsClientConfig {
                fail_at_fragment: Some(1),
                ..quick_engine()
            },
            5,
        )
        .await;

        let err = fx.handler.handle(cmd("Hello")).await.unwrap_err();
        assert!(matches!(err, ApplicationError::ProviderError(_)));

        let key = CacheKey::derive("Hello", "Cherry", "en-US", 1.0);
        assert!(!fx.cache.exists(&key).await);
    }

    #[tokio::test]
    async fn test_gate_bounds_concurrent_synthesis() {
        let fx = fixture(
            FakeTtsClientConfig {
                fragment_delay: Duration::from_millis(20),
                ..quick_engine()
            },
            2,
        )
        .await;

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let handler = fx.handler.clone();
                tokio::spawn(async move { handler.handle(cmd(&format!("text {}", i))).await })
            })
            .collect();
        for handle in handles {
            assert!(!handle.await.unwrap().unwrap().cached);
        }

        assert_eq!(fx.engine.calls(), 3);
        assert!(fx.engine.max_active() <= 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_for_same_key_synthesize_once() {
        let fx = fixture(
            FakeTtsClientConfig {
                fragment_delay: Duration::from_millis(10),
                ..quick_engine()
            },
            5,
        )
        .await;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let handler = fx.handler.clone();
                tokio::spawn(async move { handler.handle(cmd("Hello")).await })
            })
            .collect();

        let mut fresh = 0;
        let mut hashes = Vec::new();
        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            if !response.cached {
                fresh += 1;
            }
            hashes.push(response.hash);
        }

        assert_eq!(fresh, 1);
        assert_eq!(fx.engine.calls(), 1);
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    }
}
