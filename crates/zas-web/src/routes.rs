//! API routes

use axum::{
    routing::{any, get},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;

/// Create the API router; the service mounts it under `/api`
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health::health_handler))
        // Settings
        .route(
            "/settings",
            get(handlers::settings::get_settings_handler)
                .post(handlers::settings::post_settings_handler),
        )
        // Logs
        .route("/logs", get(handlers::logs::get_logs_handler))
        .route("/logs/stream", get(handlers::logs::stream_logs_handler))
        // Manual runs answer every method so non-POST gets a JSON 405
        .route("/run", any(handlers::run::run_handler))
        .with_state(state)
}
