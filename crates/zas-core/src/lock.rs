//! Advisory `flock(2)` locks shared with the worker and the settings writer
//!
//! Locks are tied to the open file descriptor and released by the kernel when
//! the guard is dropped, including when the holding process dies.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default wait for the configuration write lock
pub const CONFIG_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Held exclusive lock; released on drop
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Releasing lock");
    }
}

/// `Ok(true)` when the lock was taken, `Ok(false)` when someone else holds it
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    let fd = file.as_raw_fd();
    // SAFETY: fd is owned by `file` and stays open for the duration of the call.
    let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Ok(false);
    }
    Err(err)
}

/// Try once to take an exclusive lock on `path`, creating the file if needed
pub fn try_exclusive(path: impl AsRef<Path>) -> io::Result<Option<FileLock>> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    if try_flock_exclusive(&file)? {
        Ok(Some(FileLock {
            _file: file,
            path: path.to_path_buf(),
        }))
    } else {
        Ok(None)
    }
}

/// Poll for an exclusive lock until `timeout` elapses.
///
/// Failure to open the lock file or a timeout is reported as a persistence
/// error, since this lock only ever guards configuration writes.
pub async fn acquire_exclusive(path: impl AsRef<Path>, timeout: Duration) -> Result<FileLock> {
    let path = path.as_ref();
    let start = Instant::now();

    loop {
        match try_exclusive(path) {
            Ok(Some(lock)) => {
                debug!(path = %path.display(), "Acquired lock");
                return Ok(lock);
            }
            Ok(None) => {}
            Err(e) => {
                return Err(Error::persistence(format!(
                    "Unable to open lock file {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        if start.elapsed() >= timeout {
            warn!(path = %path.display(), "Timed out waiting for lock");
            return Err(Error::persistence(format!(
                "Timed out waiting for lock {}",
                path.display()
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Whether another process currently holds an exclusive lock on `path`.
///
/// Never creates the file. A missing file or any unexpected error reads as
/// "not held" so a broken lock file cannot block manual runs forever.
pub fn is_held_elsewhere(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    let file = match OpenOptions::new().read(true).open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };

    match try_flock_exclusive(&file) {
        // Acquired it ourselves; dropping `file` releases it again
        Ok(true) => false,
        Ok(false) => true,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Lock probe failed");
            false
        }
    }
}
