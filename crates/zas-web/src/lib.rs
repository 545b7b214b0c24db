//! zas-web: HTTP API for the ZFS auto-snapshot plugin
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  /api/health        - Health check                           │
//! │  /api/settings      - Settings view (GET) and submit (POST)  │
//! │  /api/logs          - Log tail as JSON, or export download   │
//! │  /api/logs/stream   - Live log tail (server-sent events)     │
//! │  /api/run           - Start a manual snapshot run (POST)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppState, StreamTiming};
