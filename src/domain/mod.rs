//! Domain Layer - 领域层
//!
//! 与 I/O 无关的纯逻辑：
//! - cache_key: 合成请求指纹
//! - text_chunker: 按句分块
//! - text_sanitizer: Markdown 标记清理
//! - stream_state: 流式会话状态机

mod cache_key;
mod stream_state;
mod text_chunker;
mod text_sanitizer;

pub use cache_key::{CacheKey, CACHE_KEY_LEN};
pub use stream_state::{InvalidTransition, SessionEvent, SessionState};
pub use text_chunker::{chunk_text, Chunks, DEFAULT_MAX_CHUNK_CHARS};
pub use text_sanitizer::sanitize_text;
