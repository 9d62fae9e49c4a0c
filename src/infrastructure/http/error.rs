//! HTTP Error Handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::ApplicationError;

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: &'static str,
}

impl ErrorResponse {
    pub fn new(error_code: &'static str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            error_code,
        }
    }
}

/// 错误码定义
pub mod error_code {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Provider(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, response) = match &self {
            ApiError::BadRequest(msg) => {
                tracing::warn!(error_code = error_code::VALIDATION_ERROR, error = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(error_code::VALIDATION_ERROR, msg.clone()),
                )
            }
            ApiError::NotFound(msg) => {
                tracing::warn!(error_code = error_code::NOT_FOUND, error = %msg, "Resource not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new(error_code::NOT_FOUND, msg.clone()),
                )
            }
            ApiError::Provider(msg) => {
                tracing::error!(error_code = error_code::PROVIDER_ERROR, error = %msg, "TTS provider error");
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse::new(error_code::PROVIDER_ERROR, "TTS service error"),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(error_code = error_code::INTERNAL_ERROR, error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(error_code::INTERNAL_ERROR, "Internal server error"),
                )
            }
        };

        (status, Json(response)).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        match e {
            ApplicationError::ValidationError(msg) => ApiError::BadRequest(msg),
            ApplicationError::NotFound { resource_type, id } => {
                ApiError::NotFound(format!("{} not found: {}", resource_type, id))
            }
            ApplicationError::ProviderError(msg) => ApiError::Provider(msg),
            ApplicationError::CacheError(msg) => ApiError::Internal(msg),
            ApplicationError::InternalError(msg) => ApiError::Internal(msg),
        }
    }
}

/// 请求体不是合法 JSON 或字段类型不符，与业务校验失败同样处理
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_response() {
        let response = ApiError::from(ApplicationError::validation("Text cannot be empty")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Text cannot be empty");
        assert_eq!(json["error_code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_internal_detail_not_leaked() {
        let response =
            ApiError::from(ApplicationError::CacheError("disk full at /var/secret".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error_code"], "INTERNAL_ERROR");
        assert!(!json["error"].as_str().unwrap().contains("/var/secret"));
    }

    #[tokio::test]
    async fn test_provider_error_status() {
        let response = ApiError::from(ApplicationError::provider("HTTP 401: bad key")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error_code"], "PROVIDER_ERROR");
    }
}
