//! Cache Queries - 缓存查询

use std::path::PathBuf;

use crate::application::ports::CacheMetadata;
use crate::domain::CacheKey;

/// 检查缓存查询（hash 为外部传入的原始字符串）
#[derive(Debug, Clone)]
pub struct CheckCacheQuery {
    pub hash: String,
}

/// 检查缓存响应
#[derive(Debug, Clone, PartialEq)]
pub struct CheckCacheResponse {
    pub exists: bool,
    /// 仅在存在时有值
    pub hash: Option<CacheKey>,
    pub file_size: Option<u64>,
    pub metadata: Option<CacheMetadata>,
}

impl CheckCacheResponse {
    pub fn missing() -> Self {
        Self {
            exists: false,
            hash: None,
            file_size: None,
            metadata: None,
        }
    }
}

/// 缓存统计查询
#[derive(Debug, Clone, Default)]
pub struct CacheStatsQuery;

/// 缓存统计响应
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStatsResponse {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub cache_dir: PathBuf,
}

impl CacheStatsResponse {
    /// 以 MB 表示的总大小，保留两位小数
    pub fn total_size_mb(&self) -> f64 {
        (self.total_size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}
