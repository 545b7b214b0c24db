//! Environment Configuration Loader
//!
//! Loads service environment variables from `/etc/zfs-autosnapshot/environment`
//! so the service binary and helper scripts share one set of path overrides.
//!
//! ## Usage
//!
//! Call `load_environment()` early in main() before resolving any paths:
//!
//! ```rust,no_run
//! use zas_core::environment::load_environment;
//!
//! load_environment();
//! let paths = zas_core::PluginPaths::from_env();
//! ```

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Paths checked in order of priority
pub const ENV_FILE_PATHS: &[&str] = &["/etc/zfs-autosnapshot/environment", ".env"];

/// Load environment variables from the first environment file found.
///
/// `ZAS_ENV_FILE` takes precedence over the built-in list. Variables that are
/// already set are never overridden.
///
/// Returns the path that was loaded, or None if no file was found.
pub fn load_environment() -> Option<String> {
    if let Ok(custom_path) = std::env::var("ZAS_ENV_FILE") {
        if let Some(path) = try_load_env_file(&custom_path) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded_path) = try_load_env_file(path) {
            return Some(loaded_path);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

fn try_load_env_file(path: &str) -> Option<String> {
    if !Path::new(path).is_file() {
        return None;
    }

    let content = fs::read_to_string(path)
        .map_err(|e| warn!("Failed to read environment file {}: {}", path, e))
        .ok()?;

    let (mut loaded, mut skipped) = (0usize, 0usize);
    for (key, value) in parse_env_file(&content) {
        if std::env::var_os(&key).is_some() {
            skipped += 1;
            debug!(key = %key, "Environment variable already set, keeping it");
            continue;
        }
        std::env::set_var(&key, &value);
        loaded += 1;
    }

    info!(path, loaded, skipped, "Loaded environment file");
    Some(path.to_string())
}

/// Every `KEY=VALUE` entry of an environment file, comments and blanks skipped
pub fn parse_env_file(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_env_line)
        .collect()
}

/// Parse a single `KEY=VALUE` environment line
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim().trim_start_matches("export ").trim();
    let value = value.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

/// Get a configuration value with a default.
pub fn get_config(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Interpret a textual on/off flag
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_line_simple() {
        let (k, v) = parse_env_line("ZAS_BIND=0.0.0.0:8080").unwrap();
        assert_eq!(k, "ZAS_BIND");
        assert_eq!(v, "0.0.0.0:8080");
    }

    #[test]
    fn test_parse_env_line_quoted() {
        let (k, v) = parse_env_line("ZAS_DEBUG_LOG=\"/var/log/a b.log\"").unwrap();
        assert_eq!(k, "ZAS_DEBUG_LOG");
        assert_eq!(v, "/var/log/a b.log");

        let (_, v) = parse_env_line("export ZAS_WORKER='/usr/local/sbin/x'").unwrap();
        assert_eq!(v, "/usr/local/sbin/x");
    }

    #[test]
    fn test_parse_env_file_skips_comments() {
        let entries = parse_env_file("# paths\n\nZAS_WORKER=/opt/zas\n  # ZAS_BIND=1\nnot a pair\n");
        assert_eq!(entries, vec![("ZAS_WORKER".to_string(), "/opt/zas".to_string())]);
    }

    #[test]
    fn test_parse_env_line_empty() {
        assert!(parse_env_line("").is_none());
        assert!(parse_env_line("=value").is_none());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("Yes"));
        assert!(parse_flag(" on "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }
}
