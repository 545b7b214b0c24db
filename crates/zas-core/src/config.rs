//! Plugin configuration store
//!
//! The plugin keeps its settings in a flat `KEY=VALUE` file that is also
//! sourced by the worker and the cron activation script. Only keys listed in
//! [`SCHEMA`] are recognised; anything else in the file is dropped on load.
//!
//! Values may be written bare, single-quoted (taken literally) or
//! double-quoted with `\"` and `\\` escapes. [`render`] always produces text
//! that [`parse`] reads back to the identical [`Configuration`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::environment::parse_flag;
use crate::error::{Error, Result};

lazy_static! {
    static ref LINE_RE: Regex = Regex::new(r"^\s*([A-Z0-9_]+)\s*=\s*(.*)\s*$").unwrap();
    static ref BARE_INT_RE: Regex = Regex::new(r"^[0-9]+$").unwrap();
}

/// How a field is stored and rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, always double-quoted on save
    Text,
    /// `0` / `1`
    Flag,
    /// Day counts and schedule numbers, written bare when purely numeric
    Integer,
}

/// Schema entry for one known configuration key
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
    pub default: &'static str,
}

pub const DATASETS: &str = "DATASETS";
pub const PREFIX: &str = "PREFIX";
pub const DRY_RUN: &str = "DRY_RUN";
pub const KEEP_ALL_FOR_DAYS: &str = "KEEP_ALL_FOR_DAYS";
pub const KEEP_DAILY_UNTIL_DAYS: &str = "KEEP_DAILY_UNTIL_DAYS";
pub const KEEP_WEEKLY_UNTIL_DAYS: &str = "KEEP_WEEKLY_UNTIL_DAYS";
pub const SCHEDULE_MODE: &str = "SCHEDULE_MODE";
pub const SCHEDULE_EVERY_MINUTES: &str = "SCHEDULE_EVERY_MINUTES";
pub const SCHEDULE_EVERY_HOURS: &str = "SCHEDULE_EVERY_HOURS";
pub const SCHEDULE_DAILY_HOUR: &str = "SCHEDULE_DAILY_HOUR";
pub const SCHEDULE_DAILY_MINUTE: &str = "SCHEDULE_DAILY_MINUTE";
pub const SCHEDULE_WEEKLY_DAY: &str = "SCHEDULE_WEEKLY_DAY";
pub const SCHEDULE_WEEKLY_HOUR: &str = "SCHEDULE_WEEKLY_HOUR";
pub const SCHEDULE_WEEKLY_MINUTE: &str = "SCHEDULE_WEEKLY_MINUTE";
pub const CUSTOM_CRON_SCHEDULE: &str = "CUSTOM_CRON_SCHEDULE";
pub const CRON_SCHEDULE: &str = "CRON_SCHEDULE";

/// Every key the store understands, in file order
pub const SCHEMA: [FieldSpec; 16] = [
    FieldSpec { key: DATASETS, kind: FieldKind::Text, default: "" },
    FieldSpec { key: PREFIX, kind: FieldKind::Text, default: "autosnapshot-" },
    FieldSpec { key: DRY_RUN, kind: FieldKind::Flag, default: "0" },
    FieldSpec { key: KEEP_ALL_FOR_DAYS, kind: FieldKind::Integer, default: "14" },
    FieldSpec { key: KEEP_DAILY_UNTIL_DAYS, kind: FieldKind::Integer, default: "30" },
    FieldSpec { key: KEEP_WEEKLY_UNTIL_DAYS, kind: FieldKind::Integer, default: "183" },
    FieldSpec { key: SCHEDULE_MODE, kind: FieldKind::Text, default: "disabled" },
    FieldSpec { key: SCHEDULE_EVERY_MINUTES, kind: FieldKind::Integer, default: "15" },
    FieldSpec { key: SCHEDULE_EVERY_HOURS, kind: FieldKind::Integer, default: "1" },
    FieldSpec { key: SCHEDULE_DAILY_HOUR, kind: FieldKind::Integer, default: "3" },
    FieldSpec { key: SCHEDULE_DAILY_MINUTE, kind: FieldKind::Integer, default: "0" },
    FieldSpec { key: SCHEDULE_WEEKLY_DAY, kind: FieldKind::Integer, default: "0" },
    FieldSpec { key: SCHEDULE_WEEKLY_HOUR, kind: FieldKind::Integer, default: "3" },
    FieldSpec { key: SCHEDULE_WEEKLY_MINUTE, kind: FieldKind::Integer, default: "0" },
    FieldSpec { key: CUSTOM_CRON_SCHEDULE, kind: FieldKind::Text, default: "" },
    FieldSpec { key: CRON_SCHEDULE, kind: FieldKind::Text, default: "" },
];

/// Look up the schema entry for a key
pub fn field_spec(key: &str) -> Option<&'static FieldSpec> {
    SCHEMA.iter().find(|spec| spec.key == key)
}

/// Persisted plugin settings.
///
/// Numeric fields stay textual so a rejected submission can be shown back to
/// the operator exactly as typed; typed views are produced by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub datasets: String,
    pub prefix: String,
    pub dry_run: bool,
    pub keep_all_for_days: String,
    pub keep_daily_until_days: String,
    pub keep_weekly_until_days: String,
    pub schedule_mode: String,
    pub schedule_every_minutes: String,
    pub schedule_every_hours: String,
    pub schedule_daily_hour: String,
    pub schedule_daily_minute: String,
    pub schedule_weekly_day: String,
    pub schedule_weekly_hour: String,
    pub schedule_weekly_minute: String,
    pub custom_cron_schedule: String,
    pub cron_schedule: String,
}

impl Default for Configuration {
    fn default() -> Self {
        let mut config = Self {
            datasets: String::new(),
            prefix: String::new(),
            dry_run: false,
            keep_all_for_days: String::new(),
            keep_daily_until_days: String::new(),
            keep_weekly_until_days: String::new(),
            schedule_mode: String::new(),
            schedule_every_minutes: String::new(),
            schedule_every_hours: String::new(),
            schedule_daily_hour: String::new(),
            schedule_daily_minute: String::new(),
            schedule_weekly_day: String::new(),
            schedule_weekly_hour: String::new(),
            schedule_weekly_minute: String::new(),
            custom_cron_schedule: String::new(),
            cron_schedule: String::new(),
        };
        for spec in SCHEMA.iter() {
            config.set(spec.key, spec.default);
        }
        config
    }
}

impl Configuration {
    fn text_field_mut(&mut self, key: &str) -> Option<&mut String> {
        let field = match key {
            DATASETS => &mut self.datasets,
            PREFIX => &mut self.prefix,
            KEEP_ALL_FOR_DAYS => &mut self.keep_all_for_days,
            KEEP_DAILY_UNTIL_DAYS => &mut self.keep_daily_until_days,
            KEEP_WEEKLY_UNTIL_DAYS => &mut self.keep_weekly_until_days,
            SCHEDULE_MODE => &mut self.schedule_mode,
            SCHEDULE_EVERY_MINUTES => &mut self.schedule_every_minutes,
            SCHEDULE_EVERY_HOURS => &mut self.schedule_every_hours,
            SCHEDULE_DAILY_HOUR => &mut self.schedule_daily_hour,
            SCHEDULE_DAILY_MINUTE => &mut self.schedule_daily_minute,
            SCHEDULE_WEEKLY_DAY => &mut self.schedule_weekly_day,
            SCHEDULE_WEEKLY_HOUR => &mut self.schedule_weekly_hour,
            SCHEDULE_WEEKLY_MINUTE => &mut self.schedule_weekly_minute,
            CUSTOM_CRON_SCHEDULE => &mut self.custom_cron_schedule,
            CRON_SCHEDULE => &mut self.cron_schedule,
            _ => return None,
        };
        Some(field)
    }

    /// Stored textual value of a known key
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            DATASETS => &self.datasets,
            PREFIX => &self.prefix,
            DRY_RUN => return Some(if self.dry_run { "1" } else { "0" }.to_string()),
            KEEP_ALL_FOR_DAYS => &self.keep_all_for_days,
            KEEP_DAILY_UNTIL_DAYS => &self.keep_daily_until_days,
            KEEP_WEEKLY_UNTIL_DAYS => &self.keep_weekly_until_days,
            SCHEDULE_MODE => &self.schedule_mode,
            SCHEDULE_EVERY_MINUTES => &self.schedule_every_minutes,
            SCHEDULE_EVERY_HOURS => &self.schedule_every_hours,
            SCHEDULE_DAILY_HOUR => &self.schedule_daily_hour,
            SCHEDULE_DAILY_MINUTE => &self.schedule_daily_minute,
            SCHEDULE_WEEKLY_DAY => &self.schedule_weekly_day,
            SCHEDULE_WEEKLY_HOUR => &self.schedule_weekly_hour,
            SCHEDULE_WEEKLY_MINUTE => &self.schedule_weekly_minute,
            CUSTOM_CRON_SCHEDULE => &self.custom_cron_schedule,
            CRON_SCHEDULE => &self.cron_schedule,
            _ => return None,
        };
        Some(value.clone())
    }

    /// Set a known key from its textual form. Returns false for unknown keys.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        if key == DRY_RUN {
            self.dry_run = parse_flag(value);
            return true;
        }
        match self.text_field_mut(key) {
            Some(field) => {
                *field = value.to_string();
                true
            }
            None => false,
        }
    }
}

/// Load configuration from `path` on top of the built-in defaults
pub fn load(path: impl AsRef<Path>) -> Configuration {
    load_with_defaults(path, Configuration::default())
}

/// Load configuration from `path`; a missing or unreadable file yields `defaults`
pub fn load_with_defaults(path: impl AsRef<Path>, defaults: Configuration) -> Configuration {
    let path = path.as_ref();
    if !path.is_file() {
        debug!("Config file {:?} not present, using defaults", path);
        return defaults;
    }

    match fs::read_to_string(path) {
        Ok(text) => parse(&text, defaults),
        Err(e) => {
            warn!("Failed to read config file {:?}: {}", path, e);
            defaults
        }
    }
}

/// Parse config text on top of `defaults`
pub fn parse(text: &str, defaults: Configuration) -> Configuration {
    let mut config = defaults;

    for line in text.lines() {
        let Some(caps) = LINE_RE.captures(line) else {
            continue;
        };
        let key = &caps[1];
        if field_spec(key).is_none() {
            continue;
        }
        config.set(key, &decode_value(caps[2].trim()));
    }

    config
}

fn decode_value(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return unescape_double_quoted(&raw[1..raw.len() - 1]);
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].to_string();
    }
    raw.to_string()
}

fn unescape_double_quoted(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                let decoded = match next {
                    '"' | '\\' => Some(next),
                    'n' => Some('\n'),
                    'r' => Some('\r'),
                    _ => None,
                };
                if let Some(decoded) = decoded {
                    out.push(decoded);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Double-quote a value, escaping backslashes, quotes and line breaks so the
/// value always stays on one line
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn render_value(spec: &FieldSpec, config: &Configuration) -> String {
    let value = config.get(spec.key).unwrap_or_default();
    match spec.kind {
        FieldKind::Text => quote(&value),
        FieldKind::Flag => value,
        FieldKind::Integer if BARE_INT_RE.is_match(&value) => value,
        FieldKind::Integer => quote(&value),
    }
}

/// Render the deterministic, commented config text
pub fn render(config: &Configuration) -> String {
    let line = |key: &str| -> String {
        let value = field_spec(key)
            .map(|spec| render_value(spec, config))
            .unwrap_or_default();
        format!("{}={}", key, value)
    };

    let lines = vec![
        "# -----------------------------------------------------------------------------".to_string(),
        "# ZFS Auto Snapshot plugin config".to_string(),
        "# -----------------------------------------------------------------------------".to_string(),
        String::new(),
        "# DATASETS: comma-separated dataset:threshold entries".to_string(),
        line(DATASETS),
        String::new(),
        "# Snapshot name prefix this plugin is allowed to delete".to_string(),
        line(PREFIX),
        String::new(),
        "# 1 = dry-run only, 0 = make changes".to_string(),
        line(DRY_RUN),
        String::new(),
        "# Retention windows in days".to_string(),
        line(KEEP_ALL_FOR_DAYS),
        line(KEEP_DAILY_UNTIL_DAYS),
        line(KEEP_WEEKLY_UNTIL_DAYS),
        String::new(),
        "# Human-friendly schedule fields".to_string(),
        line(SCHEDULE_MODE),
        line(SCHEDULE_EVERY_MINUTES),
        line(SCHEDULE_EVERY_HOURS),
        line(SCHEDULE_DAILY_HOUR),
        line(SCHEDULE_DAILY_MINUTE),
        line(SCHEDULE_WEEKLY_DAY),
        line(SCHEDULE_WEEKLY_HOUR),
        line(SCHEDULE_WEEKLY_MINUTE),
        line(CUSTOM_CRON_SCHEDULE),
        String::new(),
        "# Derived cron expression (for compatibility)".to_string(),
        line(CRON_SCHEDULE),
        String::new(),
    ];

    lines.join("\n")
}

/// Atomically replace the config file at `path`.
///
/// The text is written to a temporary file in the same directory and renamed
/// over the target, so readers only ever see the old or the new file.
pub fn save(path: impl AsRef<Path>, config: &Configuration) -> Result<()> {
    let path = path.as_ref();
    let write_err =
        |e: std::io::Error| Error::persistence(format!("Unable to write config file: {}: {}", path.display(), e));

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o775)
            .create(dir)
            .map_err(write_err)?;
    }

    let mut tmp = tempfile::Builder::new()
        .prefix(".zfs_autosnapshot.")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(render(config).as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o644)) {
        warn!("Failed to set permissions on {:?}: {}", path, e);
    }

    info!("Saved plugin configuration to {}", path.display());
    Ok(())
}
