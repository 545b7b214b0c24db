//! HTTP Request Handlers

use axum::{
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

pub mod health;
pub mod logs;
pub mod run;
pub mod settings;

pub const NO_CACHE: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// Headers that keep proxies and browsers from caching live plugin state
pub fn no_cache_headers() -> [(HeaderName, &'static str); 2] {
    [
        (header::CACHE_CONTROL, NO_CACHE),
        (header::PRAGMA, "no-cache"),
    ]
}

/// `{ok: false, error}` with the given status
pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        no_cache_headers(),
        Json(json!({ "ok": false, "error": message.into() })),
    )
        .into_response()
}
