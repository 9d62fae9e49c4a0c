//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（TtsEngine、AudioCache、AudioEncoder）
//! - commands: 一次性合成命令及处理器
//! - queries: 缓存查询及处理器
//! - stream: 流式会话编排
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;
pub mod stream;

// Re-exports
pub use commands::{
    handlers::GenerateSpeechHandler, GenerateSpeechCommand, GenerateSpeechResponse,
    SynthesisLimits,
};

pub use error::ApplicationError;

pub use ports::{
    map_language, AudioCachePort, AudioEncoderPort, AudioInfo, CacheError, CacheMetadata,
    CacheStats, EncodeError, NewCacheMetadata, PcmFormat, PcmStream, SynthesisRequest,
    TtsEnginePort, TtsError,
};

pub use queries::{
    handlers::{CacheStatsHandler, CheckCacheHandler},
    CacheStatsQuery, CacheStatsResponse, CheckCacheQuery, CheckCacheResponse,
};

pub use stream::{
    ClientMessage, Flow, ServerMessage, StreamContext, StreamSession, StreamSettings,
};
