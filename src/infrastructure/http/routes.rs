//! HTTP Routes
//!
//! API Endpoints:
//! - /                    GET   服务标识
//! - /tts/generate        POST  一次性合成（cache-first）
//! - /tts/check/:hash     GET   检查缓存是否存在
//! - /tts/stats           GET   缓存统计
//! - /tts/health          GET   健康检查
//! - /ws/tts              WS    流式合成
//! - /audio/<hash>.wav    GET   缓存音频静态文件

use axum::{
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes(audio_dir: &Path) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::root))
        .nest("/tts", tts_routes())
        .route("/ws/tts", get(handlers::tts_websocket_handler))
        .nest_service("/audio", ServeDir::new(audio_dir))
}

/// TTS 路由
fn tts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(handlers::generate_speech))
        .route("/check/:hash", get(handlers::check_cache))
        .route("/stats", get(handlers::cache_stats))
        .route("/health", get(handlers::health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{AudioCachePort, StreamSettings, TtsEnginePort};
    use crate::infrastructure::adapters::{FakeTtsClient, FakeTtsClientConfig, WavEncoder};
    use crate::infrastructure::memory::ConcurrencyGate;
    use crate::infrastructure::persistence::{FileAudioCache, FileCacheConfig};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    struct Fixture {
        _dir: TempDir,
        router: Router,
        engine: FakeTtsClient,
    }

    async fn fixture_with(engine: FakeTtsClient) -> Fixture {
        let dir = TempDir::new().unwrap();
        let cache = FileAudioCache::new(&FileCacheConfig {
            cache_dir: dir.path().to_path_buf(),
            extension: "wav".to_string(),
        })
        .await
        .unwrap();
        let audio_cache: Arc<dyn AudioCachePort> = Arc::new(cache);
        let tts_engine: Arc<dyn TtsEnginePort> = Arc::new(engine.clone());

        let state = AppState::new(
            audio_cache,
            tts_engine,
            Arc::new(WavEncoder::new()),
            ConcurrencyGate::new(2),
            StreamSettings::default(),
            "",
        );
        let router = create_routes(dir.path()).with_state(Arc::new(state));

        Fixture {
            _dir: dir,
            router,
            engine,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(FakeTtsClient::new(FakeTtsClientConfig {
            fragments: 2,
            fragment_bytes: 4800,
            fragment_delay: Duration::ZERO,
            fail_at_fragment: None,
        }))
        .await
    }

    async fn send(router: &Router, request: Request<Body>) -> Response {
        router.clone().oneshot(request).await.unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root() {
        let fx = fixture().await;
        let response = send(&fx.router, get_request("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "running");
    }

    #[tokio::test]
    async fn test_generate_then_cached() {
        let fx = fixture().await;
        let body = serde_json::json!({ "text": "Hello" });

        let first = body_json(send(&fx.router, post_json("/tts/generate", body.clone())).await).await;
        assert_eq!(first["success"], true);
        assert_eq!(first["cached"], false);
        assert_eq!(first["hash"], "297fabe95b9163ed693086f8f6a5ccf0");
        assert_eq!(first["url"], "/audio/297fabe95b9163ed693086f8f6a5ccf0.wav");
        assert_eq!(first["file_size"], 44 + 9600);
        assert_eq!(first["duration"], 0.2);

        let second = body_json(send(&fx.router, post_json("/tts/generate", body)).await).await;
        assert_eq!(second["cached"], true);
        assert_eq!(second["hash"], first["hash"]);
        assert!(second.get("duration").is_none());
        assert_eq!(fx.engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_generate_validation_error() {
        let fx = fixture().await;

        let response = send(&fx.router, post_json("/tts/generate", serde_json::json!({ "text": "   " }))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], "VALIDATION_ERROR");

        let response = send(
            &fx.router,
            post_json("/tts/generate", serde_json::json!({ "text": "Hi", "speed": 3.0 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(fx.engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_malformed_body_uses_error_envelope() {
        let fx = fixture().await;

        let bodies = [
            serde_json::json!({ "speed": 1.0 }),
            serde_json::json!({ "text": "Hi", "speed": "fast" }),
            serde_json::json!(["Hi"]),
        ];
        for body in bodies {
            let response = send(&fx.router, post_json("/tts/generate", body.clone())).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body={body}");
            let json = body_json(response).await;
            assert_eq!(json["success"], false);
            assert_eq!(json["error_code"], "VALIDATION_ERROR");
            assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
        }

        let not_json = Request::builder()
            .method("POST")
            .uri("/tts/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{ text: "))
            .unwrap();
        let response = send(&fx.router, not_json).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error_code"], "VALIDATION_ERROR");
        assert_eq!(fx.engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_provider_error() {
        let fx = fixture_with(FakeTtsClient::new(FakeTtsClientConfig {
            fragments: 2,
            fragment_bytes: 4800,
            fragment_delay: Duration::ZERO,
            fail_at_fragment: Some(1),
        }))
        .await;

        let response = send(&fx.router, post_json("/tts/generate", serde_json::json!({ "text": "Hello" }))).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["error_code"], "PROVIDER_ERROR");

        let check = body_json(send(&fx.router, get_request("/tts/check/297fabe95b9163ed693086f8f6a5ccf0")).await).await;
        assert_eq!(check["exists"], false);
    }

    #[tokio::test]
    async fn test_check_and_serve_audio() {
        let fx = fixture().await;
        send(&fx.router, post_json("/tts/generate", serde_json::json!({ "text": "Hello" }))).await;

        let check = body_json(send(&fx.router, get_request("/tts/check/297fabe95b9163ed693086f8f6a5ccf0")).await).await;
        assert_eq!(check["exists"], true);
        assert_eq!(check["url"], "/audio/297fabe95b9163ed693086f8f6a5ccf0.wav");
        assert_eq!(check["file_size"], 44 + 9600);
        assert_eq!(check["metadata"]["text"], "Hello");

        let response = send(&fx.router, get_request("/audio/297fabe95b9163ed693086f8f6a5ccf0.wav")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(bytes.len(), 44 + 9600);
    }

    #[tokio::test]
    async fn test_check_malformed_hash() {
        let fx = fixture().await;
        let check = body_json(send(&fx.router, get_request("/tts/check/not-a-hash")).await).await;
        assert_eq!(check, serde_json::json!({ "exists": false }));
    }

    #[tokio::test]
    async fn test_stats() {
        let fx = fixture().await;
        send(&fx.router, post_json("/tts/generate", serde_json::json!({ "text": "Hello" }))).await;
        send(&fx.router, post_json("/tts/generate", serde_json::json!({ "text": "World" }))).await;

        let stats = body_json(send(&fx.router, get_request("/tts/stats")).await).await;
        assert_eq!(stats["total_files"], 2);
        assert_eq!(stats["total_size_bytes"], 2 * (44 + 9600));
        assert_eq!(stats["total_size_mb"], 0.02);
    }

    #[tokio::test]
    async fn test_health() {
        let fx = fixture().await;
        let health = body_json(send(&fx.router, get_request("/tts/health")).await).await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["service"], "opus-tts");
        assert_eq!(health["dashscope_connected"], true);
    }
}
