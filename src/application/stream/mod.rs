//! 应用层 - 流式合成
//!
//! 单个持久连接上的分块合成与实时转发

mod messages;
mod session;

pub use messages::{ClientMessage, MessageError, ServerMessage, SynthesizeMessage};
pub use session::{Flow, StreamContext, StreamSession, StreamSettings};
