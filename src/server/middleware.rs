//! Request gatekeeping applied in front of the relay handlers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use constant_time_eq::constant_time_eq;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::error::Error;
use crate::observability::RELAY_REJECTED;

/// Sliding one-minute window shared by every request.
#[derive(Clone)]
pub struct RateLimiter {
    state: Option<Arc<Mutex<RateLimitState>>>,
}

struct RateLimitState {
    limit: u64,
    window: Duration,
    hits: VecDeque<Instant>,
}

impl RateLimiter {
    /// A limiter allowing `limit_per_minute` requests; `None` allows everything.
    pub fn new(limit_per_minute: Option<u64>) -> Self {
        Self {
            state: limit_per_minute.map(|limit| {
                Arc::new(Mutex::new(RateLimitState {
                    limit,
                    window: Duration::from_secs(60),
                    hits: VecDeque::new(),
                }))
            }),
        }
    }

    /// Record a request and report whether it fits in the window.
    pub fn allow(&self) -> bool {
        let Some(state) = &self.state else {
            return true;
        };
        let mut state = match state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        while let Some(front) = state.hits.front() {
            if now.duration_since(*front) > state.window {
                state.hits.pop_front();
            } else {
                break;
            }
        }

        if state.hits.len() as u64 >= state.limit {
            return false;
        }

        state.hits.push_back(now);
        true
    }
}

/// Reject requests beyond the configured rate with 429.
pub async fn rate_limit(State(limiter): State<RateLimiter>, req: Request, next: Next) -> Response {
    if !limiter.allow() {
        RELAY_REJECTED.click();
        tracing::warn!(path = %req.uri().path(), "rate limit exceeded");
        return Error::rate_limited("Rate limit exceeded").into_response();
    }
    next.run(req).await
}

/// Bearer token expected on every relay request.
#[derive(Clone, Default)]
pub struct BearerAuth {
    token: Option<Arc<str>>,
}

impl BearerAuth {
    /// Require `token`; `None` disables the check.
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.map(Arc::from),
        }
    }

    /// Check an `Authorization` header value.
    pub fn permits(&self, authorization: Option<&HeaderValue>) -> bool {
        let Some(expected) = &self.token else {
            return true;
        };
        authorization
            .and_then(|value| value.to_str().ok())
            .and_then(|value| {
                let (scheme, token) = value.split_once(' ')?;
                scheme.eq_ignore_ascii_case("bearer").then_some(token)
            })
            .is_some_and(|presented| {
                constant_time_eq(presented.trim().as_bytes(), expected.as_bytes())
            })
    }
}

/// Reject requests without the configured bearer token with 401.
pub async fn require_bearer(State(auth): State<BearerAuth>, req: Request, next: Next) -> Response {
    if !auth.permits(req.headers().get(header::AUTHORIZATION)) {
        RELAY_REJECTED.click();
        tracing::warn!(path = %req.uri().path(), "missing or invalid bearer token");
        return Error::unauthorized("Unauthorized").into_response();
    }
    next.run(req).await
}

/// CORS restricted to `origins`; empty or `*` allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
