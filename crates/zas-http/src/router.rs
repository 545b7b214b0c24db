//! Router Composition
//!
//! API crates hand over finished routers; this builder mounts them under
//! their prefixes and optionally falls back to a static directory for the UI.

use axum::Router;
use std::path::PathBuf;
use tower_http::services::ServeDir;
use tracing::{info, warn};

/// Builder for composing service routers
pub struct RouterBuilder {
    router: Router,
    static_dir: Option<PathBuf>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            static_dir: None,
        }
    }

    /// Add a router at a specific prefix
    pub fn nest(mut self, prefix: &'static str, name: &'static str, router: Router) -> Self {
        info!("Mounting service '{}' at {}", name, prefix);
        self.router = self.router.nest(prefix, router);
        self
    }

    /// Set static file directory (served at root, fallback)
    pub fn static_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(path.into());
        self
    }

    pub fn build(mut self) -> Router {
        if let Some(static_dir) = self.static_dir {
            if static_dir.is_dir() {
                info!("Serving static files from: {:?}", static_dir);
                self.router = self.router.fallback_service(ServeDir::new(static_dir));
            } else {
                warn!("Static directory not found: {:?}", static_dir);
            }
        }

        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
