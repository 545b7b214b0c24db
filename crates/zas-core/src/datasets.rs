//! Dataset threshold entries and the `DATASETS` CSV they are stored in

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

lazy_static! {
    static ref DATASET_NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9._/:-]+$").unwrap();
    static ref THRESHOLD_RE: Regex = Regex::new(r"^([0-9]+)([KMGT])B?$").unwrap();
}

/// Threshold used for datasets that have never been configured
pub const DEFAULT_THRESHOLD: &str = "100G";

/// A managed dataset and its free-space threshold (`<int><K|M|G|T>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub dataset: String,
    pub threshold: String,
}

impl DatasetEntry {
    pub fn new(dataset: impl Into<String>, threshold: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            threshold: threshold.into(),
        }
    }
}

impl std::fmt::Display for DatasetEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.dataset, self.threshold)
    }
}

pub fn is_valid_dataset_name(dataset: &str) -> bool {
    DATASET_NAME_RE.is_match(dataset)
}

/// Pool that owns a dataset: everything before the first `/`
pub fn dataset_pool_name(dataset: &str) -> String {
    let dataset = dataset.trim();
    dataset.split('/').next().unwrap_or_default().to_string()
}

/// Upper-case and strip spaces, as thresholds are shown back to the operator
pub fn canonical_threshold_input(value: &str) -> String {
    value.trim().replace(' ', "").to_uppercase()
}

/// Normalize a threshold such as `500m`, `100 GB` or `2T` to `<int><unit>`
pub fn normalize_threshold(value: &str) -> Option<String> {
    let value = canonical_threshold_input(value);
    let caps = THRESHOLD_RE.captures(&value)?;
    Some(format!("{}{}", &caps[1], &caps[2]))
}

/// Parse the stored `DATASETS` CSV.
///
/// Malformed entries are skipped with one warning each. A dataset listed twice
/// keeps its first position and takes the last threshold.
pub fn parse_datasets_csv(csv: &str) -> (Vec<DatasetEntry>, Vec<String>) {
    let mut entries: Vec<DatasetEntry> = Vec::new();
    let mut warnings = Vec::new();

    for part in csv.split(',') {
        let entry = part.trim();
        if entry.is_empty() {
            continue;
        }

        let Some((dataset_raw, threshold_raw)) = entry.split_once(':') else {
            warnings.push(format!(
                "Ignoring invalid DATASETS entry '{}' (missing ':').",
                entry
            ));
            continue;
        };

        let dataset = dataset_raw.trim();
        if !is_valid_dataset_name(dataset) {
            warnings.push(format!("Ignoring invalid dataset name '{}'.", dataset));
            continue;
        }

        let Some(threshold) = normalize_threshold(threshold_raw) else {
            warnings.push(format!(
                "Ignoring invalid threshold '{}' for dataset '{}'.",
                threshold_raw, dataset
            ));
            continue;
        };

        match entries.iter_mut().find(|e| e.dataset == dataset) {
            Some(existing) => existing.threshold = threshold,
            None => entries.push(DatasetEntry::new(dataset, threshold)),
        }
    }

    (entries, warnings)
}

/// Serialize entries back to the `DATASETS` CSV form
pub fn to_csv(entries: &[DatasetEntry]) -> String {
    entries
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Case-insensitive natural ordering (`tank2` sorts before `tank10`)
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let na = take_digits(&mut ai);
                let nb = take_digits(&mut bi);
                let ta = na.trim_start_matches('0');
                let tb = nb.trim_start_matches('0');
                let ord = ta.len().cmp(&tb.len()).then_with(|| ta.cmp(tb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}
