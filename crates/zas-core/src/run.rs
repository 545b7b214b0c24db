//! Manual run coordination
//!
//! A manual run launches the snapshot worker detached, with its output
//! appended to the debug log. The worker takes the run lock itself; this
//! module only probes it so two runs are not started back to back.

use serde::{Deserialize, Serialize};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::lock;
use crate::paths::PluginPaths;

/// A launched worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStarted {
    /// `0` when the shell did not report a usable PID
    pub pid: u32,
    pub message: String,
}

impl RunStarted {
    fn new(pid: u32) -> Self {
        let message = if pid > 0 {
            format!("Manual run started (PID {}).", pid)
        } else {
            "Manual run started.".to_string()
        };
        Self { pid, message }
    }
}

#[derive(Debug, Clone)]
pub struct RunCoordinator {
    worker: PathBuf,
    debug_log: PathBuf,
    run_lock: PathBuf,
    run_lock_dir: PathBuf,
}

impl RunCoordinator {
    pub fn new(paths: &PluginPaths) -> Self {
        Self {
            worker: paths.worker.clone(),
            debug_log: paths.debug_log.clone(),
            run_lock: paths.run_lock.clone(),
            run_lock_dir: paths.run_lock_dir.clone(),
        }
    }

    /// True while the worker holds the run lock or its sentinel directory exists
    pub fn is_run_in_progress(&self) -> bool {
        self.run_lock_dir.is_dir() || lock::is_held_elsewhere(&self.run_lock)
    }

    /// Start the worker in the background.
    ///
    /// The probe and the spawn are not atomic; the worker's own lock is what
    /// finally prevents overlapping runs.
    pub async fn trigger_run(&self) -> Result<RunStarted> {
        if !is_executable(&self.worker) {
            return Err(Error::NotExecutable(self.worker.display().to_string()));
        }

        if self.is_run_in_progress() {
            info!("Manual run rejected, a run is already in progress");
            return Err(Error::RunConflict);
        }

        let script = format!(
            "nohup {} >> {} 2>&1 < /dev/null & echo $!",
            shell_quote(&self.worker.to_string_lossy()),
            shell_quote(&self.debug_log.to_string_lossy()),
        );

        let output = Command::new("/bin/sh")
            .arg("-c")
            .arg(&script)
            .output()
            .await
            .map_err(|e| Error::run_launch(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() || stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "Worker launch failed");
            return Err(Error::run_launch(format!(
                "launcher exited with {}",
                output.status
            )));
        }

        let pid = parse_pid(&stdout);
        info!(pid, worker = %self.worker.display(), "Manual run started");
        Ok(RunStarted::new(pid))
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Last whitespace-separated token when it is all digits, else `0`
fn parse_pid(output: &str) -> u32 {
    output
        .split_whitespace()
        .last()
        .filter(|t| t.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|t| t.parse().ok())
        .unwrap_or(0)
}

/// Single-quote for `/bin/sh`
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_script(path: &Path, body: &str, mode: u32) {
        fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    fn setup() -> (TempDir, PluginPaths, PathBuf) {
        let dir = TempDir::new().unwrap();
        let paths = PluginPaths::under(dir.path());
        fs::create_dir_all(paths.worker.parent().unwrap()).unwrap();
        fs::create_dir_all(paths.debug_log.parent().unwrap()).unwrap();
        let marker = dir.path().join("worker-ran");
        (dir, paths, marker)
    }

    #[test]
    fn test_parse_pid() {
        assert_eq!(parse_pid("1234\n"), 1234);
        assert_eq!(parse_pid("noise\n 42 "), 42);
        assert_eq!(parse_pid("abc"), 0);
        assert_eq!(parse_pid(""), 0);
        assert_eq!(parse_pid("99999999999999"), 0);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/usr/sbin/x"), "'/usr/sbin/x'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_started_message() {
        assert_eq!(RunStarted::new(77).message, "Manual run started (PID 77).");
        assert_eq!(RunStarted::new(0).message, "Manual run started.");
    }

    #[tokio::test]
    async fn test_missing_or_plain_worker_is_not_executable() {
        let (_dir, paths, _) = setup();
        let coordinator = RunCoordinator::new(&paths);
        assert!(matches!(
            coordinator.trigger_run().await,
            Err(Error::NotExecutable(_))
        ));

        write_script(&paths.worker, "true", 0o644);
        assert!(matches!(
            coordinator.trigger_run().await,
            Err(Error::NotExecutable(_))
        ));
    }

    #[tokio::test]
    async fn test_conflict_while_lock_held_spawns_nothing() {
        let (_dir, paths, marker) = setup();
        write_script(
            &paths.worker,
            &format!("touch '{}'", marker.display()),
            0o755,
        );

        let _held = lock::try_exclusive(&paths.run_lock).unwrap().unwrap();
        let coordinator = RunCoordinator::new(&paths);
        assert!(coordinator.is_run_in_progress());
        assert!(matches!(coordinator.trigger_run().await, Err(Error::RunConflict)));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_sentinel_directory_counts_as_running() {
        let (_dir, paths, _) = setup();
        let coordinator = RunCoordinator::new(&paths);
        assert!(!coordinator.is_run_in_progress());
        fs::create_dir_all(&paths.run_lock_dir).unwrap();
        assert!(coordinator.is_run_in_progress());
    }

    #[tokio::test]
    async fn test_trigger_run_starts_worker() {
        let (_dir, paths, marker) = setup();
        write_script(
            &paths.worker,
            &format!("echo worker output\ntouch '{}'", marker.display()),
            0o755,
        );

        let coordinator = RunCoordinator::new(&paths);
        let started = coordinator.trigger_run().await.unwrap();
        assert!(started.pid > 0);
        assert_eq!(
            started.message,
            format!("Manual run started (PID {}).", started.pid)
        );

        for _ in 0..50 {
            if marker.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(marker.exists());
        let log = fs::read_to_string(&paths.debug_log).unwrap();
        assert!(log.contains("worker output"));
    }
}
