//! Fake TTS Client - 用于测试和本地开发的 TTS 客户端
//!
//! 不调用外部服务，根据文本生成确定性的 PCM 片段

use async_trait::async_trait;
use futures_util::stream;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{PcmStream, SynthesisRequest, TtsEnginePort, TtsError};

/// Fake TTS Client 配置
#[derive(Debug, Clone)]
pub struct FakeTtsClientConfig {
    /// 每次合成返回的片段数
    pub fragments: usize,
    /// 每个片段的字节数（16-bit 样本，应为偶数）
    pub fragment_bytes: usize,
    /// 每个片段之前的模拟延迟
    pub fragment_delay: Duration,
    /// 在第 N 个片段处返回错误（`None` 表示不失败）
    pub fail_at_fragment: Option<usize>,
}

impl Default for FakeTtsClientConfig {
    fn default() -> Self {
        Self {
            fragments: 4,
            fragment_bytes: 4800,
            fragment_delay: Duration::from_millis(20),
            fail_at_fragment: None,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

/// 合成进行中的计数守卫，流结束或被丢弃时归还
struct ActiveGuard(Arc<Counters>);

impl ActiveGuard {
    fn enter(counters: Arc<Counters>) -> Self {
        counters.calls.fetch_add(1, Ordering::SeqCst);
        let now = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_active.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fake TTS Client
#[derive(Debug, Clone, Default)]
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
    counters: Arc<Counters>,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        tracing::info!(
            fragments = config.fragments,
            fragment_bytes = config.fragment_bytes,
            delay_ms = config.fragment_delay.as_millis() as u64,
            "FakeTtsClient initialized"
        );
        Self {
            config,
            counters: Arc::default(),
        }
    }

    /// 累计合成调用次数
    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// 当前进行中的合成数
    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// 观察到的最大并发合成数
    pub fn max_active(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }

    /// 片段内容只取决于文本和序号
    fn fragment(&self, request: &SynthesisRequest, index: usize) -> Vec<u8> {
        let seed = request
            .text
            .bytes()
            .fold(index as u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        (0..self.config.fragment_bytes)
            .map(|i| (seed.wrapping_add(i as u32) % 251) as u8)
            .collect()
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn synthesize_stream(&self, request: &SynthesisRequest) -> Result<PcmStream, TtsError> {
        tracing::debug!(
            text_len = request.text.len(),
            voice = %request.voice,
            language = %request.language,
            "FakeTtsClient: generating fragments"
        );

        if self.config.fail_at_fragment == Some(0) {
            return Err(TtsError::Provider {
                status: 500,
                message: "fake provider failure".to_string(),
            });
        }

        let guard = ActiveGuard::enter(self.counters.clone());
        let client = self.clone();
        let request = request.clone();

        let stream = stream::unfold((0usize, Some(guard)), move |(index, guard)| {
            let client = client.clone();
            let request = request.clone();
            async move {
                let guard = guard?;
                tokio::time::sleep(client.config.fragment_delay).await;

                if client.config.fail_at_fragment == Some(index) {
                    drop(guard);
                    let err = TtsError::Provider {
                        status: 500,
                        message: "fake provider failure".to_string(),
                    };
                    return Some((Err(err), (index + 1, None)));
                }
                if index >= client.config.fragments {
                    return None;
                }

                let fragment = client.fragment(&request, index);
                Some((Ok(fragment), (index + 1, Some(guard))))
            }
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str) -> SynthesisRequest {
        SynthesisRequest {
            text: text.to_string(),
            voice: "Cherry".to_string(),
            language: "en-US".to_string(),
            speed: 1.0,
        }
    }

    fn quick(fragments: usize) -> FakeTtsClientConfig {
        FakeTtsClientConfig {
            fragments,
            fragment_bytes: 8,
            fragment_delay: Duration::from_millis(1),
            fail_at_fragment: None,
        }
    }

    #[tokio::test]
    async fn test_synthesize_is_deterministic() {
        let client = FakeTtsClient::new(quick(3));
        let a = client.synthesize(&request("Hello")).await.unwrap();
        let b = client.synthesize(&request("Hello")).await.unwrap();
        let c = client.synthesize(&request("World")).await.unwrap();

        assert_eq!(a.len(), 24);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(client.calls(), 3);
        assert_eq!(client.active(), 0);
    }

    #[tokio::test]
    async fn test_failure_mid_stream() {
        let client = FakeTtsClient::new(FakeTtsClientConfig {
            fail_at_fragment: Some(2),
            ..quick(4)
        });
        let items: Vec<_> = client
            .synthesize_stream(&request("Hello"))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok() && items[1].is_ok());
        assert!(matches!(items[2], Err(TtsError::Provider { .. })));
        assert_eq!(client.active(), 0);
    }

    #[tokio::test]
    async fn test_zero_fragments_is_empty_audio() {
        let client = FakeTtsClient::new(quick(0));
        assert!(matches!(
            client.synthesize(&request("Hello")).await,
            Err(TtsError::EmptyAudio)
        ));
    }

    #[tokio::test]
    async fn test_dropped_stream_releases_active_slot() {
        let client = FakeTtsClient::new(quick(10));
        let mut stream = client.synthesize_stream(&request("Hello")).await.unwrap();
        assert!(stream.next().await.is_some());
        assert_eq!(client.active(), 1);

        drop(stream);
        assert_eq!(client.active(), 0);
    }
}
