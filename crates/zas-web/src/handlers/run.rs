//! Manual Run Handler

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

use zas_core::Error;

use super::{json_error, no_cache_headers};
use crate::state::AppState;

/// /api/run - Start the snapshot worker in the background (POST only)
pub async fn run_handler(method: Method, State(state): State<Arc<AppState>>) -> Response {
    if method != Method::POST {
        return json_error(
            StatusCode::METHOD_NOT_ALLOWED,
            "Use POST for manual run requests.",
        );
    }

    match state.runs.trigger_run().await {
        Ok(started) => (
            no_cache_headers(),
            Json(json!({
                "ok": true,
                "pid": started.pid,
                "message": started.message,
            })),
        )
            .into_response(),
        Err(Error::RunConflict) => json_error(
            StatusCode::CONFLICT,
            "A snapshot run is already in progress.",
        ),
        Err(Error::NotExecutable(path)) => {
            warn!(worker = %path, "Snapshot worker is missing or not executable");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Snapshot script is missing or not executable.",
            )
        }
        Err(e) => {
            error!(error = %e, "Manual run failed to start");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to start manual run.")
        }
    }
}
