//! Cache Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{AudioCachePort, CacheError};
use crate::application::queries::cache_queries::*;
use crate::domain::CacheKey;

/// CheckCache Handler - 检查某个 hash 是否已缓存
pub struct CheckCacheHandler {
    audio_cache: Arc<dyn AudioCachePort>,
}

impl CheckCacheHandler {
    pub fn new(audio_cache: Arc<dyn AudioCachePort>) -> Self {
        Self { audio_cache }
    }

    pub async fn handle(&self, query: CheckCacheQuery) -> Result<CheckCacheResponse, ApplicationError> {
        // 非法 hash 直接视为不存在，不拼路径
        let Some(key) = CacheKey::parse(&query.hash) else {
            tracing::debug!(hash = %query.hash, "Rejected malformed hash");
            return Ok(CheckCacheResponse::missing());
        };

        if !self.audio_cache.exists(&key).await {
            return Ok(CheckCacheResponse::missing());
        }

        let file_size = match self.audio_cache.size_of(&key).await {
            Ok(size) => size,
            // exists 之后文件被外部删掉
            Err(CacheError::NotFound(_)) => return Ok(CheckCacheResponse::missing()),
            Err(e) => return Err(e.into()),
        };
        let metadata = self.audio_cache.metadata(&key).await;

        Ok(CheckCacheResponse {
            exists: true,
            hash: Some(key),
            file_size: Some(file_size),
            metadata,
        })
    }
}

/// CacheStats Handler - 缓存目录统计
pub struct CacheStatsHandler {
    audio_cache: Arc<dyn AudioCachePort>,
}

impl CacheStatsHandler {
    pub fn new(audio_cache: Arc<dyn AudioCachePort>) -> Self {
        Self { audio_cache }
    }

    pub async fn handle(&self, _query: CacheStatsQuery) -> Result<CacheStatsResponse, ApplicationError> {
        let stats = self.audio_cache.stats().await?;
        Ok(CacheStatsResponse {
            total_files: stats.file_count,
            total_size_bytes: stats.total_bytes,
            cache_dir: self.audio_cache.cache_dir(),
        })
    }
}
