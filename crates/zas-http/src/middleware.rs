//! Shared Middleware Stack
//!
//! Applied once to the composed router so every endpoint gets the same CORS,
//! tracing, compression and timeout behavior.

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::time::{Duration, Instant};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Middleware configuration
#[derive(Debug, Clone)]
pub struct MiddlewareConfig {
    /// Allow any origin (default: true)
    pub cors_enabled: bool,
    /// Enable request tracing (default: true)
    pub tracing_enabled: bool,
    /// Enable response compression (default: true). Event streams are never compressed.
    pub compression_enabled: bool,
    /// Request timeout (default: 90s, longer than a log stream lives)
    pub timeout: Duration,
    /// Enable security headers (default: true)
    pub security_headers: bool,
    /// Enable request logging (default: true)
    pub request_logging: bool,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            cors_enabled: true,
            tracing_enabled: true,
            compression_enabled: true,
            timeout: Duration::from_secs(90),
            security_headers: true,
            request_logging: true,
        }
    }
}

/// Middleware stack that can be applied to a router
pub struct MiddlewareStack {
    config: MiddlewareConfig,
}

impl MiddlewareStack {
    pub fn new(config: MiddlewareConfig) -> Self {
        Self { config }
    }

    /// Apply the middleware stack to a router
    pub fn apply(self, router: Router) -> Router {
        let mut router = router;

        // Security headers (innermost - runs first on response)
        if self.config.security_headers {
            router = router.layer(middleware::from_fn(security_headers_middleware));
        }

        if self.config.request_logging {
            router = router.layer(middleware::from_fn(request_logging_middleware));
        }

        router = router.layer(TimeoutLayer::new(self.config.timeout));

        if self.config.compression_enabled {
            router = router.layer(CompressionLayer::new());
        }

        if self.config.tracing_enabled {
            router = router.layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
            );
        }

        // CORS (outermost - runs first on request)
        if self.config.cors_enabled {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router
    }
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("SAMEORIGIN"));
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}

/// Logs method, path, status and latency at a level chosen by status class.
/// Event streams are logged when they open, not when they finish.
async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_millis() as u64;
    let streaming = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream"));

    match response.status() {
        s if s.is_server_error() => tracing::error!(%method, %path, status, latency_ms, "request failed"),
        s if s.is_client_error() => tracing::warn!(%method, %path, status, latency_ms, "request rejected"),
        _ if streaming => tracing::debug!(%method, %path, status, "event stream opened"),
        _ => tracing::info!(%method, %path, status, latency_ms, "request served"),
    }

    response
}

/// Convenience function to apply middleware with config
pub fn apply_middleware(router: Router, config: MiddlewareConfig) -> Router {
    MiddlewareStack::new(config).apply(router)
}
