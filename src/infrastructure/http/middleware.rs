//! HTTP Middleware
//!
//! HTTP 状态码错误日志中间件

use std::time::Instant;

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};

/// HTTP 状态码错误日志中间件
///
/// 当状态码为 4xx 或 5xx 时记录日志（附带耗时）
/// 错误详情在 ApiError::into_response() 中记录
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let latency_ms = started.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            latency_ms,
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            latency_ms,
            "HTTP client error"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ApplicationError;
    use crate::infrastructure::http::error::ApiError;
    use axum::{
        body::{to_bytes, Body},
        http::{Request as HttpRequest, StatusCode},
        routing::get,
        Router,
    };
    use tower::util::ServiceExt;

    async fn rejected() -> Result<&'static str, ApiError> {
        Err(ApplicationError::validation("Speed must be between 0.5 and 2.0").into())
    }

    async fn upstream_failed() -> Result<&'static str, ApiError> {
        Err(ApplicationError::provider("HTTP 503").into())
    }

    fn router() -> Router {
        Router::new()
            .route("/ok", get(|| async { "OK" }))
            .route("/rejected", get(rejected))
            .route("/upstream", get(upstream_failed))
            .layer(axum::middleware::from_fn(error_logging_middleware))
    }

    async fn call(uri: &str) -> Response {
        let request = HttpRequest::builder().uri(uri).body(Body::empty()).unwrap();
        router().oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_response_passes_through_unchanged() {
        let response = call("/ok").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_error_statuses_are_preserved() {
        assert_eq!(call("/rejected").await.status(), StatusCode::BAD_REQUEST);
        assert_eq!(call("/upstream").await.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(call("/missing").await.status(), StatusCode::NOT_FOUND);
    }
}
