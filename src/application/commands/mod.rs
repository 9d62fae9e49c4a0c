//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：合成并写入缓存

mod speech_commands;

pub mod handlers;

pub use speech_commands::*;
