//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_cache;
mod audio_encoder;
mod tts_engine;

pub use audio_cache::{AudioCachePort, CacheError, CacheMetadata, CacheStats, NewCacheMetadata};
pub use audio_encoder::{AudioEncoderPort, AudioInfo, EncodeError, PcmFormat};
pub use tts_engine::{map_language, PcmStream, SynthesisRequest, TtsEnginePort, TtsError};
