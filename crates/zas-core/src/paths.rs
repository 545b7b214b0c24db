//! Filesystem locations shared by the control plane, the worker and cron

use std::path::{Path, PathBuf};

use crate::environment::get_config;

pub const DEFAULT_CONFIG_FILE: &str =
    "/boot/config/plugins/zfs.autosnapshot/zfs_autosnapshot.conf";
pub const DEFAULT_ACTIVATION_SCRIPT: &str =
    "/usr/local/emhttp/plugins/zfs.autosnapshot/scripts/sync-cron.sh";
pub const DEFAULT_WORKER: &str = "/usr/local/sbin/zfs_autosnapshot";
pub const DEFAULT_DEBUG_LOG: &str = "/var/log/zfs_autosnapshot.log";
pub const DEFAULT_SUMMARY_LOG: &str = "/var/log/zfs_autosnapshot.last.log";
pub const DEFAULT_RUN_LOCK: &str = "/var/run/zfs_autosnapshot.lock";
pub const DEFAULT_RUN_LOCK_DIR: &str = "/var/run/zfs_autosnapshot.lock.d";

/// Every path the control plane touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginPaths {
    pub config_file: PathBuf,
    pub activation_script: PathBuf,
    pub worker: PathBuf,
    pub debug_log: PathBuf,
    pub summary_log: PathBuf,
    pub run_lock: PathBuf,
    pub run_lock_dir: PathBuf,
}

impl Default for PluginPaths {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            activation_script: PathBuf::from(DEFAULT_ACTIVATION_SCRIPT),
            worker: PathBuf::from(DEFAULT_WORKER),
            debug_log: PathBuf::from(DEFAULT_DEBUG_LOG),
            summary_log: PathBuf::from(DEFAULT_SUMMARY_LOG),
            run_lock: PathBuf::from(DEFAULT_RUN_LOCK),
            run_lock_dir: PathBuf::from(DEFAULT_RUN_LOCK_DIR),
        }
    }
}

impl PluginPaths {
    /// Resolve paths from `ZAS_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            config_file: get_config("ZAS_CONFIG_FILE", DEFAULT_CONFIG_FILE).into(),
            activation_script: get_config("ZAS_ACTIVATION_SCRIPT", DEFAULT_ACTIVATION_SCRIPT)
                .into(),
            worker: get_config("ZAS_WORKER", DEFAULT_WORKER).into(),
            debug_log: get_config("ZAS_DEBUG_LOG", DEFAULT_DEBUG_LOG).into(),
            summary_log: get_config("ZAS_SUMMARY_LOG", DEFAULT_SUMMARY_LOG).into(),
            run_lock: get_config("ZAS_RUN_LOCK", DEFAULT_RUN_LOCK).into(),
            run_lock_dir: get_config("ZAS_RUN_LOCK_DIR", DEFAULT_RUN_LOCK_DIR).into(),
        }
    }

    /// Lay every file out under one directory (handy for tests and dev setups)
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_file: root.join("zfs_autosnapshot.conf"),
            activation_script: root.join("sync-cron.sh"),
            worker: root.join("zfs_autosnapshot"),
            debug_log: root.join("zfs_autosnapshot.log"),
            summary_log: root.join("zfs_autosnapshot.last.log"),
            run_lock: root.join("zfs_autosnapshot.lock"),
            run_lock_dir: root.join("zfs_autosnapshot.lock.d"),
        }
    }

    /// Advisory lock guarding read-modify-write of the config file
    pub fn config_lock(&self) -> PathBuf {
        let mut name = self
            .config_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.config_file.with_file_name(name)
    }
}
