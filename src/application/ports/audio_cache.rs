//! Audio Cache Port - 内容寻址音频缓存
//!
//! 定义音频缓存的抽象接口，具体实现为文件系统存储（`<hash>.wav` + `metadata.json`）

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::CacheKey;

/// Audio Cache 错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache entry not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::IoError(err.to_string())
    }
}

/// 写入缓存时调用方提供的请求参数
#[derive(Debug, Clone, PartialEq)]
pub struct NewCacheMetadata {
    pub text: String,
    pub voice: String,
    pub language: String,
    pub speed: f64,
}

/// 持久化在 `metadata.json` 中的元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub text: String,
    pub voice: String,
    pub language: String,
    pub speed: f64,
    #[serde(deserialize_with = "deserialize_created_at")]
    pub created_at: DateTime<Utc>,
    pub hash: String,
}

/// 解析创建时间：RFC 3339，或不带时区的 ISO 8601（按 UTC 处理）
pub fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn deserialize_created_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_created_at(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid created_at: {raw}")))
}

impl CacheMetadata {
    /// 补上创建时间与 hash
    pub fn stamp(key: &CacheKey, metadata: NewCacheMetadata) -> Self {
        Self {
            text: metadata.text,
            voice: metadata.voice,
            language: metadata.language,
            speed: metadata.speed,
            created_at: Utc::now(),
            hash: key.to_string(),
        }
    }
}

/// 缓存统计信息（扫描缓存目录得到）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub file_count: usize,
    pub total_bytes: u64,
}

/// Audio Cache Port
///
/// 以 [`CacheKey`] 为地址的只增不改缓存：
/// - 条目写入后不可变，没有淘汰、没有过期
/// - 0 字节文件视为不存在
#[async_trait]
pub trait AudioCachePort: Send + Sync {
    /// 检查缓存是否存在（文件存在且大小非 0）
    async fn exists(&self, key: &CacheKey) -> bool;

    /// key 对应的文件路径（纯计算，无 I/O）
    fn path_for(&self, key: &CacheKey) -> PathBuf;

    /// 存储音频数据，提供元数据时一并写入 metadata side-store
    ///
    /// 音频先写临时文件再 rename，`exists`/`get` 不会看到写了一半的文件
    async fn save(
        &self,
        key: &CacheKey,
        audio_data: &[u8],
        metadata: Option<NewCacheMetadata>,
    ) -> Result<PathBuf, CacheError>;

    /// 读取音频数据
    async fn get(&self, key: &CacheKey) -> Result<Vec<u8>, CacheError>;

    /// 已缓存文件的大小
    async fn size_of(&self, key: &CacheKey) -> Result<u64, CacheError>;

    /// 读取元数据（元数据文件损坏时视为空，不报错）
    async fn metadata(&self, key: &CacheKey) -> Option<CacheMetadata>;

    /// 获取缓存统计信息
    async fn stats(&self) -> Result<CacheStats, CacheError>;

    /// 缓存目录
    fn cache_dir(&self) -> PathBuf;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_created_at_accepts_offset_and_naive() {
        let with_offset = parse_created_at("2024-05-01T12:30:45.123456+00:00").unwrap();
        let naive = parse_created_at("2024-05-01T12:30:45.123456").unwrap();
        assert_eq!(with_offset, naive);

        let seconds_only = parse_created_at("2024-05-01T12:30:45").unwrap();
        assert_eq!((seconds_only.day(), seconds_only.hour()), (1, 12));

        assert!(parse_created_at("yesterday").is_none());
    }

    #[test]
    fn test_metadata_round_trips_through_json() {
        let key = CacheKey::derive("Hello", "Cherry", "en-US", 1.0);
        let metadata = CacheMetadata::stamp(
            &key,
            NewCacheMetadata {
                text: "Hello".to_string(),
                voice: "Cherry".to_string(),
                language: "en-US".to_string(),
                speed: 1.0,
            },
        );

        let json = serde_json::to_value(&metadata).unwrap();
        let decoded: CacheMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, metadata);
    }
}
