//! TTS Adapter - 语音合成服务客户端实现

mod dashscope_client;
mod fake_tts_client;

pub use dashscope_client::{DashScopeConfig, DashScopeTtsClient};
pub use fake_tts_client::{FakeTtsClient, FakeTtsClientConfig};
