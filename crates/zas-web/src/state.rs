//! Application State
//!
//! Immutable for the lifetime of the server: every request reloads the plugin
//! configuration and inventory itself.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use zas_core::logs::{STREAM_DURATION, STREAM_POLL_INTERVAL};
use zas_core::{
    PluginPaths, RunCoordinator, ScheduleActivator, ScriptActivator, SettingsController,
    VolumeBackend, ZfsCliBackend,
};

/// Lifetime and poll interval of one log stream connection
#[derive(Debug, Clone, Copy)]
pub struct StreamTiming {
    pub duration: Duration,
    pub interval: Duration,
}

impl Default for StreamTiming {
    fn default() -> Self {
        Self {
            duration: STREAM_DURATION,
            interval: STREAM_POLL_INTERVAL,
        }
    }
}

/// Application state shared across all handlers
pub struct AppState {
    pub paths: PluginPaths,
    pub settings: SettingsController,
    pub runs: RunCoordinator,
    pub stream: StreamTiming,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// State backed by the real `zpool`/`zfs` tools and the cron sync script
    pub fn new(paths: PluginPaths) -> Self {
        let activator = Arc::new(ScriptActivator::new(paths.activation_script.clone()));
        Self::with_collaborators(paths, Arc::new(ZfsCliBackend::new()), activator)
    }

    pub fn with_collaborators(
        paths: PluginPaths,
        backend: Arc<dyn VolumeBackend>,
        activator: Arc<dyn ScheduleActivator>,
    ) -> Self {
        info!(config = %paths.config_file.display(), "Initializing application state");
        Self {
            settings: SettingsController::new(paths.clone(), backend, activator),
            runs: RunCoordinator::new(&paths),
            stream: StreamTiming::default(),
            start_time: Instant::now(),
            paths,
        }
    }

    pub fn with_stream_timing(mut self, timing: StreamTiming) -> Self {
        self.stream = timing;
        self
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
