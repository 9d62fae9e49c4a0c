//! Audio Encoder Port - PCM 封装
//!
//! 将原始 PCM 样本封装为自描述的音频容器（当前只有 WAV）

use thiserror::Error;

/// 编码错误
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Audio too large: {0} bytes")]
    TooLarge(usize),
}

/// PCM 格式参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_rate: u32,
}

impl PcmFormat {
    /// 每个采样帧的字节数
    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    /// 每秒字节数
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// PCM 字节数对应的时长（秒）
    pub fn duration_secs(&self, pcm_bytes: usize) -> f64 {
        let byte_rate = self.byte_rate();
        if byte_rate == 0 {
            return 0.0;
        }
        pcm_bytes as f64 / byte_rate as f64
    }
}

impl Default for PcmFormat {
    /// 合成服务输出格式：24kHz / 16-bit / mono
    fn default() -> Self {
        Self {
            channels: 1,
            bits_per_sample: 16,
            sample_rate: 24000,
        }
    }
}

/// 容器头信息
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub format: PcmFormat,
    /// data chunk 声明的字节数
    pub data_size: usize,
    /// 采样帧数
    pub frames: usize,
    /// 时长（毫秒）
    pub duration_ms: u64,
}

/// Audio Encoder Port
///
/// 编码是确定性的：相同的 PCM 与参数总是得到逐字节相同的输出
pub trait AudioEncoderPort: Send + Sync {
    /// 容器文件扩展名
    fn extension(&self) -> &'static str;

    /// 将 PCM 封装为容器
    fn encode(&self, pcm: &[u8], format: &PcmFormat) -> Result<Vec<u8>, EncodeError>;

    /// 解析容器头
    fn probe(&self, data: &[u8]) -> Result<AudioInfo, EncodeError>;
}
