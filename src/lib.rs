//! ttscache - cache-first TTS 合成与流式转发服务
//!
//! 架构设计: Hexagonal Architecture + CQRS
//!
//! 领域层 (domain/):
//! - 缓存 key、文本清理与分块、流式会话状态机
//!
//! 应用层 (application/):
//! - Ports: 端口定义（TtsEngine, AudioCache, AudioEncoder）
//! - Commands: 一次性合成
//! - Queries: 缓存检查与统计
//! - Stream: 流式会话编排
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + WebSocket
//! - Memory: 并发闸门、按 key 加锁
//! - Persistence: 文件系统音频缓存
//! - Adapters: DashScope 客户端、WAV 封装

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
