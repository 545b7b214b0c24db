//! Control plane for the ZFS auto-snapshot plugin
//!
//! # Modules
//!
//! - `config`: Plugin configuration store (`KEY=VALUE` file)
//! - `cron`: Schedule fields to cron expression
//! - `datasets`: Dataset/threshold entries and their CSV form
//! - `environment`: Service environment file and `get_config*` helpers
//! - `error`: Error types and Result alias
//! - `inventory`: Live dataset discovery
//! - `lock`: Advisory file locks
//! - `logs`: Log tailing, streaming state and export
//! - `paths`: Filesystem locations used by the plugin
//! - `reconcile`: Merge inventory and configuration into selection rows
//! - `run`: Manual snapshot runs
//! - `settings`: Settings view and submission

pub mod config;
pub mod cron;
pub mod datasets;
pub mod environment;
pub mod error;
pub mod inventory;
pub mod lock;
pub mod logs;
pub mod paths;
pub mod reconcile;
pub mod run;
pub mod settings;

// Re-exports
pub use config::Configuration;
pub use cron::{derive_cron, derive_cron_for, ScheduleIntent, ScheduleMode};
pub use datasets::DatasetEntry;
pub use environment::{get_config, load_environment};
pub use error::{Error, Result, ValidationErrors};
pub use inventory::{discover, Inventory, VolumeBackend, ZfsCliBackend};
pub use logs::{LogKind, LogPayload, LogStreamSession, StreamEvent};
pub use paths::PluginPaths;
pub use reconcile::{DatasetForm, DatasetRow, PoolSummary};
pub use run::{RunCoordinator, RunStarted};
pub use settings::{
    ScheduleActivator, ScriptActivator, SettingsController, SettingsPage, SettingsSubmission,
    SubmitOutcome, SubmitStatus,
};
