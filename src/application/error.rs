//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{CacheError, EncodeError, TtsError};

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 验证错误（请求参数不合法，没有任何副作用）
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 合成服务错误
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// 缓存错误
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建合成服务错误
    pub fn provider(message: impl Into<String>) -> Self {
        Self::ProviderError(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<TtsError> for ApplicationError {
    fn from(err: TtsError) -> Self {
        Self::ProviderError(err.to_string())
    }
}

impl From<CacheError> for ApplicationError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound(key) => Self::not_found("Audio", key),
            other => Self::CacheError(other.to_string()),
        }
    }
}

impl From<EncodeError> for ApplicationError {
    fn from(err: EncodeError) -> Self {
        Self::InternalError(err.to_string())
    }
}
