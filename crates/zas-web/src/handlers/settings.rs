//! Settings API Handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use zas_core::{SettingsPage, SettingsSubmission, SubmitStatus};

use super::no_cache_headers;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    /// Saved and applied without any error
    pub ok: bool,
    pub saved: bool,
    pub applied: bool,
    #[serde(flatten)]
    pub page: SettingsPage,
}

/// GET /api/settings - Current settings merged with the live dataset inventory
pub async fn get_settings_handler(State(state): State<Arc<AppState>>) -> Response {
    let page = state.settings.view().await;
    (
        no_cache_headers(),
        Json(SettingsResponse {
            ok: true,
            saved: false,
            applied: false,
            page,
        }),
    )
        .into_response()
}

/// POST /api/settings - Validate, save and apply a settings submission
pub async fn post_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<SettingsSubmission>,
) -> Response {
    let outcome = state.settings.submit(submission).await;
    info!(status = ?outcome.status, "Settings submission handled");

    let code = match outcome.status {
        SubmitStatus::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
        SubmitStatus::PersistFailed => StatusCode::INTERNAL_SERVER_ERROR,
        SubmitStatus::SavedNotApplied | SubmitStatus::Applied => StatusCode::OK,
    };

    (
        code,
        no_cache_headers(),
        Json(SettingsResponse {
            ok: outcome.status.applied(),
            saved: outcome.status.saved(),
            applied: outcome.status.applied(),
            page: outcome.page,
        }),
    )
        .into_response()
}
