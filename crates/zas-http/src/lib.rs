//! zas-http: HTTP server for the auto-snapshot service
//!
//! Owns listener setup, the shared middleware stack and router composition.
//! API crates export plain routers that get mounted here.
//!
//! ```text
//! zas-service binary
//!     └── zas-http (this crate)
//!         ├── Middleware stack (CORS, tracing, compression, timeout)
//!         └── Router composition
//!             ├── /api/*  → zas_web::create_router()
//!             └── /*      → static files
//! ```

pub mod middleware;
pub mod router;
pub mod server;

// Re-export main types
pub use middleware::{MiddlewareConfig, MiddlewareStack};
pub use router::RouterBuilder;
pub use server::{shutdown_signal, HttpServer, HttpServerBuilder, ServerConfig};

pub use axum;

/// Error types for the HTTP server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Server binding error: {0}")]
    BindError(#[from] std::io::Error),

    #[error("Invalid bind address: {0}")]
    AddressError(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;
