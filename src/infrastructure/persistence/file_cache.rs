//! File-based Content-Addressed Audio Cache
//!
//! 目录布局：
//! - `<hash>.<ext>`     音频文件
//! - `metadata.json`    hash -> 元数据 的 side-store
//!
//! 缓存没有容量上限、没有淘汰、没有过期，运维侧需要自行关注磁盘占用。
//! 元数据的内存镜像只在单进程内加锁，多进程共享同一目录时不安全。
//!
//! `metadata.json` 里的条目按原样保留，读取时逐条解码：
//! 某一条解不出来只影响这一条，写入新条目时旧条目原样写回。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::application::ports::{
    AudioCachePort, CacheError, CacheMetadata, CacheStats, NewCacheMetadata,
};
use crate::domain::CacheKey;

/// 元数据文件名
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// hash -> 原始 JSON 条目
type MetadataMap = HashMap<String, Value>;

/// 文件缓存配置
#[derive(Debug, Clone)]
pub struct FileCacheConfig {
    /// 缓存目录
    pub cache_dir: PathBuf,
    /// 音频文件扩展名
    pub extension: String,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data/audio"),
            extension: "wav".to_string(),
        }
    }
}

/// 文件系统音频缓存
pub struct FileAudioCache {
    cache_dir: PathBuf,
    extension: String,
    metadata_path: PathBuf,
    /// 元数据内存镜像，首次访问时加载
    metadata: Mutex<Option<MetadataMap>>,
}

impl FileAudioCache {
    /// 创建缓存实例（确保目录存在）
    pub async fn new(config: &FileCacheConfig) -> Result<Self, CacheError> {
        fs::create_dir_all(&config.cache_dir).await?;

        tracing::info!(
            cache_dir = %config.cache_dir.display(),
            extension = %config.extension,
            "FileAudioCache initialized"
        );

        Ok(Self {
            metadata_path: config.cache_dir.join(METADATA_FILE_NAME),
            cache_dir: config.cache_dir.clone(),
            extension: config.extension.clone(),
            metadata: Mutex::new(None),
        })
    }

    /// 读取元数据文件，缺失或损坏时返回空表
    async fn read_metadata_file(&self) -> MetadataMap {
        let bytes = match fs::read(&self.metadata_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return MetadataMap::new(),
            Err(e) => {
                tracing::warn!(
                    path = %self.metadata_path.display(),
                    error = %e,
                    "Metadata unreadable, treating as empty"
                );
                return MetadataMap::new();
            }
        };

        match serde_json::from_slice::<MetadataMap>(&bytes) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(
                    path = %self.metadata_path.display(),
                    error = %e,
                    "Metadata corrupted, treating as empty"
                );
                MetadataMap::new()
            }
        }
    }

    async fn loaded<'a>(&self, slot: &'a mut Option<MetadataMap>) -> &'a mut MetadataMap {
        if slot.is_none() {
            *slot = Some(self.read_metadata_file().await);
        }
        slot.get_or_insert_with(MetadataMap::new)
    }

    /// 先写临时文件再 rename 到目标路径
    async fn write_atomic(&self, target: &Path, data: &[u8]) -> Result<(), CacheError> {
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let temp = self
            .cache_dir
            .join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        if let Err(e) = fs::write(&temp, data).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn save_metadata(&self, key: &CacheKey, metadata: NewCacheMetadata) -> Result<(), CacheError> {
        let mut guard = self.metadata.lock().await;
        let map = self.loaded(&mut guard).await;
        let entry = serde_json::to_value(CacheMetadata::stamp(key, metadata))
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        map.insert(key.to_string(), entry);

        let json = serde_json::to_vec_pretty(map)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        self.write_atomic(&self.metadata_path, &json).await
    }
}

#[async_trait]
impl AudioCachePort for FileAudioCache {
    async fn exists(&self, key: &CacheKey) -> bool {
        let exists = fs::metadata(self.path_for(key))
            .await
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false);

        tracing::debug!(hash = %key, exists = exists, "Cache lookup");
        exists
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(format!("{}.{}", key, self.extension))
    }

    async fn save(
        &self,
        key: &CacheKey,
        audio_data: &[u8],
        metadata: Option<NewCacheMetadata>,
    ) -> Result<PathBuf, CacheError> {
        let path = self.path_for(key);
        self.write_atomic(&path, audio_data).await?;

        if let Some(metadata) = metadata {
            // 元数据写失败只丢元数据，不影响音频
            if let Err(e) = self.save_metadata(key, metadata).await {
                tracing::error!(hash = %key, error = %e, "Failed to save cache metadata");
            }
        }

        tracing::info!(
            hash = %key,
            size_bytes = audio_data.len(),
            path = %path.display(),
            "Audio cached"
        );

        Ok(path)
    }

    async fn get(&self, key: &CacheKey) -> Result<Vec<u8>, CacheError> {
        match fs::read(self.path_for(key)).await {
            Ok(data) if !data.is_empty() => Ok(data),
            Ok(_) => Err(CacheError::NotFound(key.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CacheError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn size_of(&self, key: &CacheKey) -> Result<u64, CacheError> {
        match fs::metadata(self.path_for(key)).await {
            Ok(m) => Ok(m.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CacheError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn metadata(&self, key: &CacheKey) -> Option<CacheMetadata> {
        let mut guard = self.metadata.lock().await;
        let map = self.loaded(&mut guard).await;
        let entry = map.get(key.as_str())?;

        match CacheMetadata::deserialize(entry) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(hash = %key, error = %e, "Skipping undecodable metadata entry");
                None
            }
        }
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();
        let mut entries = fs::read_dir(&self.cache_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == self.extension.as_str()) {
                if let Ok(metadata) = entry.metadata().await {
                    if metadata.is_file() {
                        stats.file_count += 1;
                        stats.total_bytes += metadata.len();
                    }
                }
            }
        }

        Ok(stats)
    }

    fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }
}
