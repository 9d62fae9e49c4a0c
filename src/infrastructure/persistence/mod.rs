//! Persistence Layer - 音频缓存持久化
//!
//! 基于文件系统的内容寻址缓存

mod file_cache;

pub use file_cache::{FileAudioCache, FileCacheConfig, METADATA_FILE_NAME};
