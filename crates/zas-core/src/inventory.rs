//! Volume inventory discovery
//!
//! Asks the storage backend which datasets currently exist. Discovery is
//! best-effort: a failing pool only removes that pool's datasets from the
//! result, and a completely failing backend yields an empty inventory plus a
//! diagnostic. Configured datasets stay authoritative either way.

use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::datasets::{is_valid_dataset_name, natural_cmp};
use crate::error::{Error, Result};

/// Enumeration calls the inventory reader needs from the storage backend
#[async_trait]
pub trait VolumeBackend: Send + Sync {
    /// Names of all imported pools
    async fn enumerate_pools(&self) -> Result<Vec<String>>;

    /// Filesystems and volumes inside one pool (recursive)
    async fn enumerate_volumes(&self, pool: &str) -> Result<Vec<String>>;

    /// Flat listing across every pool
    async fn enumerate_all_volumes(&self) -> Result<Vec<String>>;
}

/// Backend that shells out to the `zpool` and `zfs` command-line tools
#[derive(Debug, Clone)]
pub struct ZfsCliBackend {
    zpool_bin: String,
    zfs_bin: String,
}

impl Default for ZfsCliBackend {
    fn default() -> Self {
        Self {
            zpool_bin: "zpool".to_string(),
            zfs_bin: "zfs".to_string(),
        }
    }
}

impl ZfsCliBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use explicit binaries instead of looking them up on `PATH`
    pub fn with_binaries(zpool_bin: impl Into<String>, zfs_bin: impl Into<String>) -> Self {
        Self {
            zpool_bin: zpool_bin.into(),
            zfs_bin: zfs_bin.into(),
        }
    }

    async fn run_lines(&self, program: &str, args: &[&str]) -> Result<Vec<String>> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::discovery(format!("failed to execute {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::discovery(format!(
                "{} {} exited with {}: {}",
                program,
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.to_string())
            .collect())
    }
}

#[async_trait]
impl VolumeBackend for ZfsCliBackend {
    async fn enumerate_pools(&self) -> Result<Vec<String>> {
        self.run_lines(&self.zpool_bin, &["list", "-H", "-o", "name"]).await
    }

    async fn enumerate_volumes(&self, pool: &str) -> Result<Vec<String>> {
        self.run_lines(
            &self.zfs_bin,
            &["list", "-H", "-o", "name", "-t", "filesystem,volume", "-r", pool],
        )
        .await
    }

    async fn enumerate_all_volumes(&self) -> Result<Vec<String>> {
        self.run_lines(
            &self.zfs_bin,
            &["list", "-H", "-o", "name", "-t", "filesystem,volume"],
        )
        .await
    }
}

/// Result of one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    /// Naturally sorted, deduplicated, syntactically valid dataset names
    pub volumes: Vec<String>,
    /// Set when discovery was partial or failed outright
    pub diagnostic: Option<String>,
}

fn collect_valid(lines: &[String], into: &mut BTreeSet<String>) {
    for line in lines {
        let dataset = line.trim();
        if !dataset.is_empty() && is_valid_dataset_name(dataset) {
            into.insert(dataset.to_string());
        }
    }
}

fn sorted(set: BTreeSet<String>) -> Vec<String> {
    let mut list: Vec<String> = set.into_iter().collect();
    list.sort_by(|a, b| natural_cmp(a, b));
    list
}

/// Discover the live dataset inventory. Never fails.
pub async fn discover(backend: &dyn VolumeBackend) -> Inventory {
    let mut found = BTreeSet::new();
    let mut diagnostic = None;

    match backend.enumerate_pools().await {
        Ok(pools) if !pools.is_empty() => {
            let mut failed_pools = Vec::new();

            for pool in pools.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
                match backend.enumerate_volumes(pool).await {
                    Ok(lines) => collect_valid(&lines, &mut found),
                    Err(e) => {
                        warn!(pool = %pool, error = %e, "Pool scan failed");
                        failed_pools.push(pool.to_string());
                    }
                }
            }

            if !found.is_empty() {
                if !failed_pools.is_empty() {
                    diagnostic = Some(format!(
                        "Some pools could not be scanned: {}",
                        failed_pools.join(", ")
                    ));
                }
                debug!("Discovered {} datasets", found.len());
                return Inventory {
                    volumes: sorted(found),
                    diagnostic,
                };
            }

            if !failed_pools.is_empty() {
                diagnostic = Some(format!(
                    "Could not auto-discover datasets from these pools: {}",
                    failed_pools.join(", ")
                ));
            }
        }
        Ok(_) => debug!("No pools reported, falling back to flat listing"),
        Err(e) => debug!(error = %e, "Pool listing unavailable, falling back to flat listing"),
    }

    match backend.enumerate_all_volumes().await {
        Ok(lines) => {
            collect_valid(&lines, &mut found);
            Inventory {
                volumes: sorted(found),
                diagnostic,
            }
        }
        Err(e) => {
            warn!(error = %e, "Dataset discovery failed");
            Inventory {
                volumes: Vec::new(),
                diagnostic: diagnostic.or_else(|| {
                    Some("Could not auto-discover datasets from ZFS on this page load.".to_string())
                }),
            }
        }
    }
}
