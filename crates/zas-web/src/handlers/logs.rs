//! Log Handlers
//!
//! One-shot tail, combined export download, and the live tail stream.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderName},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

use zas_core::logs::{self, clamp_lines, EXPORT_FILENAME};
use zas_core::{LogKind, LogStreamSession};

use super::{no_cache_headers, NO_CACHE};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    /// `summary` (default) or `debug`
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub lines: Option<String>,
    /// `1` downloads both logs as one text file
    pub download: Option<String>,
}

/// GET /api/logs - Tail one log as JSON, or download the combined export
pub async fn get_logs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Response {
    if query.download.as_deref() == Some("1") {
        return export_response(&state);
    }

    let kind = LogKind::resolve(query.kind.as_deref());
    let lines = clamp_lines(query.lines.as_deref());
    let payload = logs::load_log(&state.paths, kind, lines).await;

    (no_cache_headers(), Json(payload)).into_response()
}

fn export_response(state: &AppState) -> Response {
    debug!("Streaming log export");
    let body = Body::from_stream(logs::export_stream(&state.paths));

    let disposition = format!("attachment; filename=\"{}\"", EXPORT_FILENAME);
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=UTF-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, NO_CACHE.to_string()),
            (header::PRAGMA, "no-cache".to_string()),
        ],
        body,
    )
        .into_response()
}

/// GET /api/logs/stream - Server-sent `payload` events when the log changes,
/// `ping` events otherwise. Ends after a fixed lifetime; clients reconnect.
pub async fn stream_logs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let kind = LogKind::resolve(query.kind.as_deref());
    let lines = clamp_lines(query.lines.as_deref());
    let paths = state.paths.clone();
    let timing = state.stream;

    debug!(kind = kind.as_str(), lines, "Log stream opened");

    let stream = async_stream::stream! {
        let mut session = LogStreamSession::with_duration(kind, lines, timing.duration);
        loop {
            let payload = logs::load_log(&paths, kind, lines).await;
            let event = session.observe(payload);
            match event.data() {
                Ok(data) => yield Ok::<Event, Infallible>(Event::default().event(event.name()).data(data)),
                Err(e) => warn!(error = %e, "Failed to encode log stream event"),
            }

            if session.expired() {
                break;
            }
            tokio::time::sleep(timing.interval).await;
        }
        debug!(kind = kind.as_str(), "Log stream closed");
    };

    (
        [
            (header::CACHE_CONTROL, NO_CACHE),
            (header::PRAGMA, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream),
    )
        .into_response()
}
