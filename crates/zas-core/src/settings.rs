//! Settings controller
//!
//! Ties the config store, inventory, reconciler and cron engine together for
//! the settings page: a read-only view, and a submission that validates the
//! whole form, persists it and asks the activation delegate to reinstall the
//! cron entry.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{self, Configuration};
use crate::cron::{
    cron_is_single_line, derive_cron, int_in_range, normalize_weekday, ScheduleIntent,
    ScheduleMode, CUSTOM_CRON_SINGLE_LINE,
};
use crate::datasets::{parse_datasets_csv, DatasetEntry};
use crate::error::{Error, Result, ValidationErrors};
use crate::inventory::{discover, Inventory, VolumeBackend};
use crate::lock::{self, CONFIG_LOCK_TIMEOUT};
use crate::paths::PluginPaths;
use crate::run::shell_quote;
use crate::reconcile::{
    build_datasets_csv, build_pools, reconcile, reconcile_submitted, DatasetForm, DatasetRow,
    PoolSummary,
};

lazy_static! {
    static ref PREFIX_RE: Regex = Regex::new(r"^[A-Za-z0-9._:-]+$").unwrap();
}

/// Installs the schedule from the saved configuration into the system cron
#[async_trait]
pub trait ScheduleActivator: Send + Sync {
    /// `Err(Error::Activation)` carries the delegate's output lines joined by `" | "`
    async fn activate(&self) -> Result<()>;
}

/// Runs the plugin's cron sync script with stderr folded into stdout, so a
/// failure reports the output lines in the order the script wrote them
#[derive(Debug, Clone)]
pub struct ScriptActivator {
    script: PathBuf,
}

impl ScriptActivator {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait]
impl ScheduleActivator for ScriptActivator {
    async fn activate(&self) -> Result<()> {
        debug!(script = %self.script.display(), "Running schedule activation");
        let command = format!("{} 2>&1", shell_quote(&self.script.to_string_lossy()));
        let output = Command::new("/bin/sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::activation(format!("{}: {}", self.script.display(), e)))?;

        if output.status.success() {
            return Ok(());
        }

        let combined = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<&str> = combined.lines().map(str::trim_end).collect();
        warn!(status = %output.status, "Schedule activation failed");
        Err(Error::activation(lines.join(" | ")))
    }
}

/// Settings form as posted. Absent scalars keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SettingsSubmission {
    pub prefix: Option<String>,
    /// Unchecked checkboxes are not submitted, so absent means off
    pub dry_run: bool,
    pub keep_all_for_days: Option<String>,
    pub keep_daily_until_days: Option<String>,
    pub keep_weekly_until_days: Option<String>,
    pub schedule_mode: Option<String>,
    pub schedule_every_minutes: Option<String>,
    pub schedule_every_hours: Option<String>,
    pub schedule_daily_hour: Option<String>,
    pub schedule_daily_minute: Option<String>,
    pub schedule_weekly_day: Option<String>,
    pub schedule_weekly_hour: Option<String>,
    pub schedule_weekly_minute: Option<String>,
    pub custom_cron_schedule: Option<String>,
    pub datasets: DatasetForm,
}

/// Everything the settings page renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsPage {
    pub config: Configuration,
    pub datasets: Vec<DatasetRow>,
    pub pools: Vec<PoolSummary>,
    pub errors: Vec<String>,
    pub notices: Vec<String>,
    /// Resolved cron expression, `(disabled)` when there is none
    pub cron: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    /// Rejected by validation; nothing was written
    Invalid,
    /// The config file could not be written
    PersistFailed,
    /// Saved, but the activation delegate failed
    SavedNotApplied,
    Applied,
}

impl SubmitStatus {
    pub fn saved(&self) -> bool {
        matches!(self, Self::SavedNotApplied | Self::Applied)
    }

    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub status: SubmitStatus,
    #[serde(flatten)]
    pub page: SettingsPage,
}

fn resolved_cron(config: &Configuration) -> String {
    let cron = config.cron_schedule.trim();
    if cron.is_empty() {
        "(disabled)".to_string()
    } else {
        cron.to_string()
    }
}

fn error_message(e: Error) -> String {
    match e {
        Error::Persistence(msg) | Error::Activation(msg) => msg,
        other => other.to_string(),
    }
}

fn overlay(stored: &mut String, submitted: &Option<String>) {
    if let Some(value) = submitted {
        *stored = value.trim().to_string();
    }
}

/// Validate a bounded integer field in place, storing its normalized form
fn normalize_int(
    field: &mut String,
    min: u32,
    max: u32,
    label: &str,
    errors: &mut ValidationErrors,
) -> Option<u32> {
    let n = int_in_range(field, min, max, label, errors)?;
    *field = n.to_string();
    Some(n)
}

/// State loaded fresh for every request
struct Snapshot {
    config: Configuration,
    configured: Vec<DatasetEntry>,
    inventory: Inventory,
    notices: Vec<String>,
}

pub struct SettingsController {
    paths: PluginPaths,
    backend: Arc<dyn VolumeBackend>,
    activator: Arc<dyn ScheduleActivator>,
    lock_timeout: Duration,
}

impl SettingsController {
    pub fn new(
        paths: PluginPaths,
        backend: Arc<dyn VolumeBackend>,
        activator: Arc<dyn ScheduleActivator>,
    ) -> Self {
        Self {
            paths,
            backend,
            activator,
            lock_timeout: CONFIG_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    async fn snapshot(&self) -> Snapshot {
        let config = config::load(&self.paths.config_file);
        let (configured, mut notices) = parse_datasets_csv(&config.datasets);
        let inventory = discover(self.backend.as_ref()).await;
        if let Some(diagnostic) = &inventory.diagnostic {
            notices.push(diagnostic.clone());
        }
        Snapshot {
            config,
            configured,
            inventory,
            notices,
        }
    }

    /// Current settings merged with the live inventory
    pub async fn view(&self) -> SettingsPage {
        let snapshot = self.snapshot().await;
        let datasets = reconcile(&snapshot.inventory.volumes, &snapshot.configured);
        SettingsPage {
            cron: resolved_cron(&snapshot.config),
            pools: build_pools(&datasets),
            datasets,
            config: snapshot.config,
            errors: Vec::new(),
            notices: snapshot.notices,
        }
    }

    /// Validate, persist and activate a submission.
    ///
    /// Every problem in the form is reported at once. Nothing is written unless
    /// the whole form is valid, and a failed activation does not undo the save.
    pub async fn submit(&self, submission: SettingsSubmission) -> SubmitOutcome {
        let _guard = match lock::acquire_exclusive(self.paths.config_lock(), self.lock_timeout).await
        {
            Ok(guard) => guard,
            Err(e) => {
                warn!(error = %e, "Settings submission could not take the config lock");
                let mut page = self.view().await;
                page.errors.push(error_message(e));
                return SubmitOutcome {
                    status: SubmitStatus::PersistFailed,
                    page,
                };
            }
        };

        let snapshot = self.snapshot().await;
        let mut notices = snapshot.notices;
        let mut errors = ValidationErrors::new();
        let mut submitted = snapshot.config;

        overlay(&mut submitted.prefix, &submission.prefix);
        submitted.dry_run = submission.dry_run;
        overlay(&mut submitted.keep_all_for_days, &submission.keep_all_for_days);
        overlay(&mut submitted.keep_daily_until_days, &submission.keep_daily_until_days);
        overlay(&mut submitted.keep_weekly_until_days, &submission.keep_weekly_until_days);
        overlay(&mut submitted.schedule_mode, &submission.schedule_mode);
        submitted.schedule_mode = submitted.schedule_mode.to_lowercase();
        overlay(&mut submitted.schedule_every_minutes, &submission.schedule_every_minutes);
        overlay(&mut submitted.schedule_every_hours, &submission.schedule_every_hours);
        overlay(&mut submitted.schedule_daily_hour, &submission.schedule_daily_hour);
        overlay(&mut submitted.schedule_daily_minute, &submission.schedule_daily_minute);
        overlay(&mut submitted.schedule_weekly_day, &submission.schedule_weekly_day);
        overlay(&mut submitted.schedule_weekly_hour, &submission.schedule_weekly_hour);
        overlay(&mut submitted.schedule_weekly_minute, &submission.schedule_weekly_minute);
        overlay(&mut submitted.custom_cron_schedule, &submission.custom_cron_schedule);

        let form = &submission.datasets;
        let mut rows = reconcile_submitted(form, &snapshot.inventory.volumes, &snapshot.configured);

        if form.names.is_empty() {
            errors.push("Dataset selection data was not submitted. Refresh the page and try again.");
        } else if let Some(csv) = build_datasets_csv(form, &mut errors) {
            submitted.datasets = csv;
        }

        if !PREFIX_RE.is_match(&submitted.prefix) {
            errors.push("Prefix can only contain letters, numbers, dot, underscore, colon, and dash.");
        }

        let keep_all = normalize_int(
            &mut submitted.keep_all_for_days,
            1,
            36500,
            "Keep all for days",
            &mut errors,
        );
        let keep_daily = normalize_int(
            &mut submitted.keep_daily_until_days,
            2,
            36500,
            "Keep daily until days",
            &mut errors,
        );
        let keep_weekly = normalize_int(
            &mut submitted.keep_weekly_until_days,
            3,
            36500,
            "Keep weekly until days",
            &mut errors,
        );

        if errors.is_empty() {
            if let (Some(all), Some(daily), Some(weekly)) = (keep_all, keep_daily, keep_weekly) {
                if all >= daily || daily >= weekly {
                    errors.push("Retention must follow: keep all < keep daily until < keep weekly until.");
                }
            }
        }

        if !ScheduleMode::ALL
            .iter()
            .any(|mode| mode.as_str() == submitted.schedule_mode)
        {
            errors.push("Schedule mode is invalid.");
        }

        normalize_int(&mut submitted.schedule_every_minutes, 1, 59, "Every N minutes", &mut errors);
        normalize_int(&mut submitted.schedule_every_hours, 1, 24, "Every N hours", &mut errors);
        normalize_int(&mut submitted.schedule_daily_hour, 0, 23, "Daily hour", &mut errors);
        normalize_int(&mut submitted.schedule_daily_minute, 0, 59, "Daily minute", &mut errors);
        match normalize_weekday(&submitted.schedule_weekly_day) {
            Some(day) => submitted.schedule_weekly_day = day.to_string(),
            None => errors.push("Weekly day must be a day number (0-6) or weekday name."),
        }
        normalize_int(&mut submitted.schedule_weekly_hour, 0, 23, "Weekly hour", &mut errors);
        normalize_int(&mut submitted.schedule_weekly_minute, 0, 59, "Weekly minute", &mut errors);
        if !cron_is_single_line(&submitted.custom_cron_schedule) {
            errors.push(CUSTOM_CRON_SINGLE_LINE);
        }

        submitted.cron_schedule = derive_cron(&ScheduleIntent::from_config(&submitted), &mut errors);

        let config = submitted;
        let mut messages = errors.into_messages();

        let status = if !messages.is_empty() {
            info!(count = messages.len(), "Settings submission rejected");
            SubmitStatus::Invalid
        } else if let Err(e) = config::save(&self.paths.config_file, &config) {
            warn!(error = %e, "Failed to save settings");
            messages.push(error_message(e));
            SubmitStatus::PersistFailed
        } else {
            match self.activator.activate().await {
                Ok(()) => {
                    info!(cron = %config.cron_schedule, "Settings saved and schedule applied");
                    notices.push("Settings saved and schedule applied.".to_string());
                    let (saved_entries, _) = parse_datasets_csv(&config.datasets);
                    rows = reconcile(&snapshot.inventory.volumes, &saved_entries);
                    SubmitStatus::Applied
                }
                Err(e) => {
                    messages.push(format!(
                        "Settings saved, but failed to apply scheduler: {}",
                        error_message(e)
                    ));
                    SubmitStatus::SavedNotApplied
                }
            }
        };

        SubmitOutcome {
            status,
            page: SettingsPage {
                cron: resolved_cron(&config),
                pools: build_pools(&rows),
                datasets: rows,
                config,
                errors: messages,
                notices,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::tests::FakeBackend;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeActivator {
        failure: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ScheduleActivator for FakeActivator {
        async fn activate(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.failure {
                Some(output) => Err(Error::activation(output.clone())),
                None => Ok(()),
            }
        }
    }

    struct Fixture {
        _dir: TempDir,
        paths: PluginPaths,
        activator: Arc<FakeActivator>,
        controller: SettingsController,
    }

    fn fixture(activator: FakeActivator) -> Fixture {
        let dir = TempDir::new().unwrap();
        let paths = PluginPaths::under(dir.path());
        let backend = Arc::new(
            FakeBackend::default()
                .with_pool("tank", &["tank", "tank/appdata", "tank/media"])
                .with_pool("cache", &["cache"]),
        );
        let activator = Arc::new(activator);
        let controller = SettingsController::new(paths.clone(), backend, activator.clone())
            .with_lock_timeout(Duration::from_millis(200));
        Fixture {
            _dir: dir,
            paths,
            activator,
            controller,
        }
    }

    fn select(names: &[(&str, bool, &str)]) -> DatasetForm {
        DatasetForm {
            names: names.iter().map(|r| r.0.to_string()).collect(),
            selected: names
                .iter()
                .map(|r| if r.1 { "1" } else { "0" }.to_string())
                .collect(),
            thresholds: names.iter().map(|r| r.2.to_string()).collect(),
        }
    }

    fn valid_submission() -> SettingsSubmission {
        SettingsSubmission {
            prefix: Some(" nightly- ".into()),
            keep_all_for_days: Some("14".into()),
            keep_daily_until_days: Some("30".into()),
            keep_weekly_until_days: Some("183".into()),
            schedule_mode: Some("Daily".into()),
            schedule_daily_hour: Some("02".into()),
            schedule_daily_minute: Some("30".into()),
            datasets: select(&[
                ("tank/appdata", true, "500m"),
                ("tank/media", false, "100G"),
                ("cache", true, "2t"),
            ]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_view_merges_inventory_and_config() {
        let f = fixture(FakeActivator::default());
        let mut config = Configuration::default();
        config.datasets = "tank/appdata:1T,gone/old:5G,broken".into();
        config::save(&f.paths.config_file, &config).unwrap();

        let page = f.controller.view().await;
        assert_eq!(page.cron, "(disabled)");
        assert_eq!(page.notices.len(), 1);
        assert!(page.notices[0].contains("missing ':'"));

        let appdata = page.datasets.iter().find(|r| r.dataset == "tank/appdata").unwrap();
        assert!(appdata.selected && appdata.available);
        assert_eq!(appdata.threshold, "1T");

        let gone = page.datasets.iter().find(|r| r.dataset == "gone/old").unwrap();
        assert!(gone.selected && !gone.available);

        let media = page.datasets.iter().find(|r| r.dataset == "tank/media").unwrap();
        assert!(!media.selected);
        assert_eq!(media.threshold, "100G");

        let pools: Vec<&str> = page.pools.iter().map(|p| p.pool.as_str()).collect();
        assert_eq!(pools, vec!["cache", "gone", "tank"]);
    }

    #[tokio::test]
    async fn test_valid_submission_saves_and_applies() {
        let f = fixture(FakeActivator::default());
        let outcome = f.controller.submit(valid_submission()).await;

        assert_eq!(outcome.status, SubmitStatus::Applied, "{:?}", outcome.page.errors);
        assert_eq!(outcome.page.notices, vec!["Settings saved and schedule applied."]);
        assert_eq!(outcome.page.cron, "30 2 * * *");
        assert_eq!(f.activator.calls.load(Ordering::SeqCst), 1);

        let saved = config::load(&f.paths.config_file);
        assert_eq!(saved.prefix, "nightly-");
        assert_eq!(saved.datasets, "tank/appdata:500M,cache:2T");
        assert_eq!(saved.schedule_mode, "daily");
        assert_eq!(saved.schedule_daily_hour, "2");
        assert_eq!(saved.cron_schedule, "30 2 * * *");
        assert!(!saved.dry_run);

        let media = outcome
            .page
            .datasets
            .iter()
            .find(|r| r.dataset == "tank/media")
            .unwrap();
        assert!(!media.selected);
    }

    #[tokio::test]
    async fn test_zero_selected_leaves_file_unchanged() {
        let f = fixture(FakeActivator::default());
        config::save(&f.paths.config_file, &Configuration::default()).unwrap();
        let before = fs::read(&f.paths.config_file).unwrap();

        let mut submission = valid_submission();
        submission.datasets = select(&[("tank/appdata", false, "100G")]);
        let outcome = f.controller.submit(submission).await;

        assert_eq!(outcome.status, SubmitStatus::Invalid);
        assert!(outcome
            .page
            .errors
            .contains(&"Select at least one dataset for automatic snapshots.".to_string()));
        assert_eq!(fs::read(&f.paths.config_file).unwrap(), before);
        assert_eq!(f.activator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_dataset_arrays() {
        let f = fixture(FakeActivator::default());
        let mut submission = valid_submission();
        submission.datasets = DatasetForm::default();
        let outcome = f.controller.submit(submission).await;
        assert_eq!(outcome.status, SubmitStatus::Invalid);
        assert_eq!(
            outcome.page.errors,
            vec!["Dataset selection data was not submitted. Refresh the page and try again."]
        );
        assert!(!f.paths.config_file.exists());
    }

    #[tokio::test]
    async fn test_retention_must_be_strictly_increasing() {
        let f = fixture(FakeActivator::default());
        let mut submission = valid_submission();
        submission.keep_all_for_days = Some("30".into());
        let outcome = f.controller.submit(submission).await;
        assert_eq!(outcome.status, SubmitStatus::Invalid);
        assert_eq!(
            outcome.page.errors,
            vec!["Retention must follow: keep all < keep daily until < keep weekly until."]
        );

        let outcome = f.controller.submit(valid_submission()).await;
        assert_eq!(outcome.status, SubmitStatus::Applied);
    }

    #[tokio::test]
    async fn test_reports_every_problem_at_once() {
        let f = fixture(FakeActivator::default());
        let mut submission = valid_submission();
        submission.prefix = Some("bad prefix!".into());
        submission.keep_weekly_until_days = Some("forever".into());
        submission.schedule_mode = Some("minutes".into());
        submission.schedule_every_minutes = Some("90".into());
        submission.datasets = select(&[("tank/appdata", true, "lots")]);

        let outcome = f.controller.submit(submission).await;
        assert_eq!(outcome.status, SubmitStatus::Invalid);
        let errors = &outcome.page.errors;
        assert!(errors.iter().any(|e| e.contains("invalid threshold")));
        assert!(errors.iter().any(|e| e.starts_with("Prefix can only contain")));
        assert!(errors.contains(&"Keep weekly until days must be an integer (3-36500).".to_string()));
        assert!(errors.contains(&"Every N minutes must be between 1 and 59.".to_string()));
        // Retention ordering is only checked on an otherwise clean form
        assert!(!errors.iter().any(|e| e.starts_with("Retention must follow")));
        // Shown back as typed
        assert_eq!(outcome.page.config.prefix, "bad prefix!");
        assert_eq!(outcome.page.datasets[0].threshold, "LOTS");
        assert_eq!(f.activator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_weekly_day_names_are_normalized() {
        let f = fixture(FakeActivator::default());
        let mut submission = valid_submission();
        submission.schedule_mode = Some("weekly".into());
        submission.schedule_weekly_day = Some("Sunday".into());
        submission.schedule_weekly_hour = Some("4".into());
        submission.schedule_weekly_minute = Some("15".into());

        let outcome = f.controller.submit(submission).await;
        assert_eq!(outcome.status, SubmitStatus::Applied);
        assert_eq!(outcome.page.cron, "15 4 * * 0");
        assert_eq!(config::load(&f.paths.config_file).schedule_weekly_day, "0");
    }

    #[tokio::test]
    async fn test_invalid_mode() {
        let f = fixture(FakeActivator::default());
        let mut submission = valid_submission();
        submission.schedule_mode = Some("Fortnightly".into());
        let outcome = f.controller.submit(submission).await;
        assert_eq!(
            outcome.page.errors,
            vec![
                "Schedule mode is invalid.",
                "Invalid schedule mode 'fortnightly'.",
            ]
        );
    }

    #[tokio::test]
    async fn test_multi_line_custom_cron_is_rejected() {
        let f = fixture(FakeActivator::default());
        let mut submission = valid_submission();
        submission.schedule_mode = Some("custom".into());
        submission.custom_cron_schedule = Some("0 0 * *\n*".into());

        let outcome = f.controller.submit(submission).await;
        assert_eq!(outcome.status, SubmitStatus::Invalid);
        assert_eq!(outcome.page.errors, vec![CUSTOM_CRON_SINGLE_LINE]);
        assert!(!f.paths.config_file.exists());
        assert_eq!(f.activator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_custom_cron_is_checked_in_every_mode() {
        let f = fixture(FakeActivator::default());
        let mut submission = valid_submission();
        submission.custom_cron_schedule = Some("5 4\r* * *".into());

        let outcome = f.controller.submit(submission).await;
        assert_eq!(outcome.status, SubmitStatus::Invalid);
        assert_eq!(outcome.page.errors, vec![CUSTOM_CRON_SINGLE_LINE]);
    }

    #[tokio::test]
    async fn test_saved_settings_read_back_identically() {
        let f = fixture(FakeActivator::default());
        let mut submission = valid_submission();
        submission.schedule_mode = Some("custom".into());
        submission.custom_cron_schedule = Some(" 0\t0 * * 1 ".into());

        let outcome = f.controller.submit(submission).await;
        assert_eq!(outcome.status, SubmitStatus::Applied);
        assert_eq!(config::load(&f.paths.config_file), outcome.page.config);
    }

    #[tokio::test]
    async fn test_activation_failure_keeps_the_save() {
        let f = fixture(FakeActivator {
            failure: Some("crontab: busy | retry later".into()),
            ..Default::default()
        });
        let outcome = f.controller.submit(valid_submission()).await;

        assert_eq!(outcome.status, SubmitStatus::SavedNotApplied);
        assert!(outcome.status.saved() && !outcome.status.applied());
        assert_eq!(
            outcome.page.errors,
            vec!["Settings saved, but failed to apply scheduler: crontab: busy | retry later"]
        );
        assert_eq!(config::load(&f.paths.config_file).cron_schedule, "30 2 * * *");
    }

    #[tokio::test]
    async fn test_lock_contention_is_a_persistence_failure() {
        let f = fixture(FakeActivator::default());
        let _held = lock::try_exclusive(f.paths.config_lock()).unwrap().unwrap();

        let outcome = f.controller.submit(valid_submission()).await;
        assert_eq!(outcome.status, SubmitStatus::PersistFailed);
        assert!(outcome.page.errors[0].starts_with("Timed out waiting for lock"));
        assert!(!f.paths.config_file.exists());
    }

    #[tokio::test]
    async fn test_script_activator_joins_output() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("sync-cron.sh");
        fs::write(
            &script,
            "#!/bin/sh\necho first\necho oops >&2\necho second\nexit 3\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        match ScriptActivator::new(&script).activate().await {
            Err(Error::Activation(output)) => assert_eq!(output, "first | oops | second"),
            other => panic!("unexpected: {:?}", other),
        }

        fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        assert!(ScriptActivator::new(&script).activate().await.is_ok());
    }
}
