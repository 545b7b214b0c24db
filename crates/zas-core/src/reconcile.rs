//! Dataset reconciliation
//!
//! Merges the live inventory with the configured dataset entries into the
//! rows shown to the operator. A configured dataset that the backend does not
//! currently report is kept as an unavailable row; its configuration is never
//! dropped just because discovery missed it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::datasets::{
    canonical_threshold_input, dataset_pool_name, is_valid_dataset_name, natural_cmp,
    normalize_threshold, to_csv, DatasetEntry, DEFAULT_THRESHOLD,
};
use crate::error::ValidationErrors;

/// One row of the dataset selection table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub dataset: String,
    pub pool: String,
    pub selected: bool,
    pub threshold: String,
    pub available: bool,
}

/// Per-pool selection counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub pool: String,
    pub total: usize,
    pub selected: usize,
}

/// Dataset selection as submitted by the settings form: three parallel arrays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetForm {
    #[serde(default)]
    pub names: Vec<String>,
    /// `"1"` marks the row at the same index as selected
    #[serde(default)]
    pub selected: Vec<String>,
    #[serde(default)]
    pub thresholds: Vec<String>,
}

impl DatasetForm {
    fn is_selected(&self, index: usize) -> bool {
        self.selected.get(index).map(|v| v == "1").unwrap_or(false)
    }

    fn threshold(&self, index: usize) -> &str {
        self.thresholds.get(index).map(|t| t.trim()).unwrap_or("")
    }

    /// `(index, trimmed name)` for each non-blank name, first occurrence only
    fn unique_names(&self) -> Vec<(usize, String)> {
        let mut seen = HashSet::new();
        self.names
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let name = raw.trim();
                if name.is_empty() || !seen.insert(name.to_string()) {
                    return None;
                }
                Some((index, name.to_string()))
            })
            .collect()
    }
}

fn configured_threshold<'a>(configured: &'a [DatasetEntry], dataset: &str) -> Option<&'a str> {
    configured
        .iter()
        .find(|e| e.dataset == dataset)
        .map(|e| e.threshold.as_str())
}

fn compare_rows(a: &DatasetRow, b: &DatasetRow) -> Ordering {
    natural_cmp(&a.pool, &b.pool)
        .then_with(|| natural_cmp(&a.dataset, &b.dataset))
        .then_with(|| b.available.cmp(&a.available))
}

/// Sort by pool, then dataset (both natural, case-insensitive), available first
pub fn sort_rows(rows: &mut [DatasetRow]) {
    rows.sort_by(compare_rows);
}

/// Build rows from the live inventory and the stored configuration
pub fn reconcile(live_volumes: &[String], configured: &[DatasetEntry]) -> Vec<DatasetRow> {
    let mut rows = Vec::with_capacity(live_volumes.len() + configured.len());
    let mut seen = HashSet::new();

    for dataset in live_volumes {
        let threshold = configured_threshold(configured, dataset);
        rows.push(DatasetRow {
            dataset: dataset.clone(),
            pool: dataset_pool_name(dataset),
            selected: threshold.is_some(),
            threshold: threshold.unwrap_or(DEFAULT_THRESHOLD).to_string(),
            available: true,
        });
        seen.insert(dataset.as_str());
    }

    for entry in configured {
        if seen.contains(entry.dataset.as_str()) {
            continue;
        }
        rows.push(DatasetRow {
            dataset: entry.dataset.clone(),
            pool: dataset_pool_name(&entry.dataset),
            selected: true,
            threshold: entry.threshold.clone(),
            available: false,
        });
    }

    sort_rows(&mut rows);
    rows
}

/// Build rows straight from a submitted form so a rejected submission can be
/// shown back exactly as the operator left it
pub fn reconcile_submitted(
    form: &DatasetForm,
    live_volumes: &[String],
    configured: &[DatasetEntry],
) -> Vec<DatasetRow> {
    let live: HashSet<&str> = live_volumes.iter().map(|v| v.as_str()).collect();

    let mut rows: Vec<DatasetRow> = form
        .unique_names()
        .into_iter()
        .map(|(index, dataset)| {
            let mut threshold = form.threshold(index);
            if threshold.is_empty() {
                threshold = configured_threshold(configured, &dataset).unwrap_or(DEFAULT_THRESHOLD);
            }
            DatasetRow {
                pool: dataset_pool_name(&dataset),
                selected: form.is_selected(index),
                threshold: canonical_threshold_input(threshold),
                available: live.contains(dataset.as_str()),
                dataset,
            }
        })
        .collect();

    sort_rows(&mut rows);
    rows
}

/// Group rows by pool, sorted by pool name
pub fn build_pools(rows: &[DatasetRow]) -> Vec<PoolSummary> {
    let mut pools: Vec<PoolSummary> = Vec::new();

    for row in rows.iter().filter(|r| !r.pool.is_empty()) {
        let index = match pools.iter().position(|p| p.pool == row.pool) {
            Some(index) => index,
            None => {
                pools.push(PoolSummary {
                    pool: row.pool.clone(),
                    total: 0,
                    selected: 0,
                });
                pools.len() - 1
            }
        };
        let summary = &mut pools[index];
        summary.total += 1;
        if row.selected {
            summary.selected += 1;
        }
    }

    pools.sort_by(|a, b| natural_cmp(&a.pool, &b.pool));
    pools
}

/// Rebuild the `DATASETS` CSV from a submitted form.
///
/// All-or-nothing: if no row is selected, or any selected row has a bad name
/// or threshold, every problem is recorded and `None` is returned.
pub fn build_datasets_csv(form: &DatasetForm, errors: &mut ValidationErrors) -> Option<String> {
    let mut entries = Vec::new();
    let mut selected_count = 0;

    for (index, dataset) in form.unique_names() {
        if !form.is_selected(index) {
            continue;
        }
        selected_count += 1;

        if !is_valid_dataset_name(&dataset) {
            errors.push(format!("Invalid dataset name '{}'.", dataset));
            continue;
        }

        match normalize_threshold(form.threshold(index)) {
            Some(threshold) => entries.push(DatasetEntry::new(dataset, threshold)),
            None => errors.push(format!(
                "Dataset '{}' has an invalid threshold. Use values like 500M, 100G, or 2T.",
                dataset
            )),
        }
    }

    if selected_count == 0 {
        errors.push("Select at least one dataset for automatic snapshots.");
        return None;
    }

    if entries.len() != selected_count {
        return None;
    }

    Some(to_csv(&entries))
}
