//! The relay HTTP server.
//!
//! Routes:
//! - `POST /api/chat/stream`: relay a conversation as server-sent events
//! - `POST /api/chat`: relay a conversation and answer in one JSON reply
//! - `GET /health`: liveness probe, exempt from auth and rate limiting
//!
//! Every `/api` route sits behind the rate limiter and the bearer check; every
//! response carries CORS and security headers.

mod config;
mod handlers;
mod middleware;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderValue, StatusCode, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::error::Error;
use crate::types::ErrorBody;
use crate::upstream::CompletionProvider;

pub use config::{ServerArgs, ServerConfig};
pub use middleware::{BearerAuth, RateLimiter, cors_layer};

/// State shared by the handlers.
///
/// The provider is built once at startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Upstream completion provider.
    pub provider: Arc<dyn CompletionProvider>,
}

impl AppState {
    /// Wrap a provider.
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/api/chat/stream", post(handlers::chat_stream))
        .route("/api/chat", post(handlers::chat))
        .route_layer(from_fn_with_state(
            BearerAuth::new(config.auth_token.clone()),
            middleware::require_bearer,
        ))
        .route_layer(from_fn_with_state(
            RateLimiter::new(config.rate_limit_per_minute),
            middleware::rate_limit,
        ));

    let security_headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .layer(security_headers)
        .layer(cors_layer(&config.allowed_origins))
        .with_state(state)
}

/// Bind `config.bind_address()` and serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> crate::Result<()> {
    let app = router(state, config);
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| Error::io(format!("Failed to bind to {address}: {e}"), e))?;
    tracing::info!(%address, model = %config.model, "messagegpt relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::io(format!("Server error: {e}"), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::sse::Frame;
    use crate::types::{ChatCompletionChunk, RoleMessage};
    use crate::upstream::ChunkStream;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use futures::stream;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct Scripted {
        deltas: Vec<&'static str>,
        fail_mid_stream: bool,
        fail_open: bool,
        calls: AtomicUsize,
        received: Mutex<Vec<RoleMessage>>,
    }

    impl Scripted {
        fn new(deltas: Vec<&'static str>) -> Self {
            Self {
                deltas,
                fail_mid_stream: false,
                fail_open: false,
                calls: AtomicUsize::new(0),
                received: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl CompletionProvider for Scripted {
        async fn stream(&self, messages: Vec<RoleMessage>) -> Result<ChunkStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.received.lock().unwrap() = messages;
            if self.fail_open {
                return Err(Error::upstream("401 invalid_api_key sk-live", Some(401), None));
            }
            let mut items: Vec<Result<ChatCompletionChunk>> = self
                .deltas
                .iter()
                .map(|d| Ok(ChatCompletionChunk::text(*d)))
                .collect();
            if self.fail_mid_stream {
                items.push(Err(Error::upstream("connection reset", None, None)));
            }
            Ok(Box::pin(stream::iter(items)))
        }

        async fn complete(&self, messages: Vec<RoleMessage>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.received.lock().unwrap() = messages;
            if self.fail_open {
                return Err(Error::upstream("quota exceeded", Some(429), None));
            }
            Ok(self.deltas.concat())
        }
    }

    fn app(provider: Arc<Scripted>, config: ServerConfig) -> Router {
        router(AppState::new(provider), &config)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_is_open() {
        let config = ServerConfig {
            auth_token: Some("s3cret".to_string()),
            ..ServerConfig::default()
        };
        let response = app(Arc::new(Scripted::new(vec![])), config)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn stream_relays_frames_in_order() {
        let provider = Arc::new(Scripted::new(vec!["Hello", ", ", "world"]));
        let response = app(provider.clone(), ServerConfig::default())
            .oneshot(post_json(
                "/api/chat/stream",
                r#"{"messages":[{"role":"user","content":"hi"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONNECTION], "keep-alive");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

        let body = body_text(response).await;
        assert_eq!(
            body,
            concat!(
                "data: \"Hello\"\n\n",
                "data: \", \"\n\n",
                "data: \"world\"\n\n",
                "event: done\ndata: [DONE]\n\n",
            )
        );
        assert_eq!(
            *provider.received.lock().unwrap(),
            vec![RoleMessage::user("hi")]
        );
    }

    #[tokio::test]
    async fn empty_messages_are_rejected_without_upstream_call() {
        let provider = Arc::new(Scripted::new(vec!["unused"]));
        let response = app(provider.clone(), ServerConfig::default())
            .oneshot(post_json("/api/chat/stream", r#"{"messages":[]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["error"].is_string());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let provider = Arc::new(Scripted::new(vec![]));
        let response = app(provider.clone(), ServerConfig::default())
            .oneshot(post_json("/api/chat/stream", "{"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upstream_failure_before_stream_is_500() {
        let provider = Arc::new(Scripted {
            fail_open: true,
            ..Scripted::new(vec![])
        });
        let response = app(provider, ServerConfig::default())
            .oneshot(post_json("/api/chat/stream", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(response).await;
        assert!(body.contains(crate::GENERIC_FAILURE));
        assert!(!body.contains("sk-live"));
    }

    #[tokio::test]
    async fn upstream_failure_mid_stream_ends_with_error_frame() {
        let provider = Arc::new(Scripted {
            fail_mid_stream: true,
            ..Scripted::new(vec!["partial"])
        });
        let response = app(provider, ServerConfig::default())
            .oneshot(post_json("/api/chat/stream", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.starts_with("data: \"partial\"\n\n"));
        assert!(body.ends_with(&Frame::error().encode()));
        assert!(!body.contains("[DONE]"));
    }

    #[tokio::test]
    async fn legacy_chat_replies_in_one_piece() {
        let provider = Arc::new(Scripted::new(vec!["Salmon ", "sizzles"]));
        let response = app(provider, ServerConfig::default())
            .oneshot(post_json("/api/chat", r#"{"message":"Write a haiku"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"reply":"Salmon sizzles"}"#);
    }

    #[tokio::test]
    async fn bearer_token_is_enforced() {
        let config = ServerConfig {
            auth_token: Some("s3cret".to_string()),
            ..ServerConfig::default()
        };
        let provider = Arc::new(Scripted::new(vec!["Hi"]));
        let app = app(provider.clone(), config);

        let response = app
            .clone()
            .oneshot(post_json("/api/chat", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        let mut request = post_json("/api/chat", r#"{"message":"hi"}"#);
        request.headers_mut().insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer s3cret"),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_is_enforced() {
        let config = ServerConfig {
            rate_limit_per_minute: Some(1),
            ..ServerConfig::default()
        };
        let app = app(Arc::new(Scripted::new(vec!["Hi"])), config);

        let first = app
            .clone()
            .oneshot(post_json("/api/chat", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(post_json("/api/chat", r#"{"message":"again"}"#))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let body: serde_json::Value = serde_json::from_str(&body_text(second).await).unwrap();
        assert_eq!(body["error"], "Rate limit exceeded");
    }

    #[tokio::test]
    async fn cors_allowlist() {
        let config = ServerConfig {
            allowed_origins: vec!["http://localhost:4200".to_string()],
            ..ServerConfig::default()
        };
        let app = app(Arc::new(Scripted::new(vec![])), config);

        let allowed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://localhost:4200")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:4200"
        );

        let denied = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://evil.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(
            denied
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }
}
