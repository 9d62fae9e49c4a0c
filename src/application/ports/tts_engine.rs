//! TTS Engine Port - 语音合成引擎抽象
//!
//! 定义外部合成服务的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use thiserror::Error;

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    /// 服务端返回非成功状态（整个请求或单个片段）
    #[error("Provider error: {status} - {message}")]
    Provider { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No audio data received from provider")]
    EmptyAudio,

    #[error("Provider credential is not configured")]
    NotConfigured,
}

/// 合成请求
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    /// 语言代码（如 `en-US`），由引擎实现映射为服务端的语言名
    pub language: String,
    pub speed: f64,
}

/// 原始 PCM 片段流（24kHz / 16-bit / mono）
///
/// 流结束即 end-of-stream；任一 `Err` 为终止错误
pub type PcmStream = BoxStream<'static, Result<Vec<u8>, TtsError>>;

/// TTS Engine Port
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 以片段流的形式合成
    async fn synthesize_stream(&self, request: &SynthesisRequest) -> Result<PcmStream, TtsError>;

    /// 一次性合成，返回完整的 PCM 数据
    ///
    /// 默认实现收集 `synthesize_stream` 的所有片段，没有任何音频时返回 [`TtsError::EmptyAudio`]
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, TtsError> {
        let mut stream = self.synthesize_stream(request).await?;
        let mut pcm = Vec::new();
        while let Some(fragment) = stream.next().await {
            pcm.extend_from_slice(&fragment?);
        }
        if pcm.is_empty() {
            return Err(TtsError::EmptyAudio);
        }
        Ok(pcm)
    }

    /// 服务凭证是否已配置（健康检查用）
    fn is_configured(&self) -> bool {
        true
    }
}

/// 常见 locale 代码到服务端语言名的映射，未知代码原样透传
pub fn map_language(language: &str) -> &str {
    match language {
        "en-US" | "en" => "English",
        "zh-CN" | "zh" => "Chinese",
        "ja-JP" | "ja" => "Japanese",
        "ko-KR" | "ko" => "Korean",
        "fr-FR" | "fr" => "French",
        "es-ES" | "es" => "Spanish",
        other => other,
    }
}
