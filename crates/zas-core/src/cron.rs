//! Cron expression derivation
//!
//! Translates the human-friendly schedule fields into the 5-field expression
//! handed to the system cron daemon.

use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::error::{Result, ValidationErrors};

/// Supported schedule modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    #[default]
    Disabled,
    Minutes,
    Hourly,
    Daily,
    Weekly,
    Custom,
}

impl ScheduleMode {
    pub const ALL: [ScheduleMode; 6] = [
        ScheduleMode::Disabled,
        ScheduleMode::Minutes,
        ScheduleMode::Hourly,
        ScheduleMode::Daily,
        ScheduleMode::Weekly,
        ScheduleMode::Custom,
    ];

    /// Case-insensitive; an empty mode means disabled
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "disabled" => Some(Self::Disabled),
            "minutes" => Some(Self::Minutes),
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Minutes => "minutes",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schedule fields exactly as entered by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleIntent {
    pub mode: String,
    pub every_minutes: String,
    pub every_hours: String,
    pub daily_hour: String,
    pub daily_minute: String,
    pub weekly_day: String,
    pub weekly_hour: String,
    pub weekly_minute: String,
    pub custom_cron: String,
}

impl ScheduleIntent {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            mode: config.schedule_mode.clone(),
            every_minutes: config.schedule_every_minutes.clone(),
            every_hours: config.schedule_every_hours.clone(),
            daily_hour: config.schedule_daily_hour.clone(),
            daily_minute: config.schedule_daily_minute.clone(),
            weekly_day: config.schedule_weekly_day.clone(),
            weekly_hour: config.schedule_weekly_hour.clone(),
            weekly_minute: config.schedule_weekly_minute.clone(),
            custom_cron: config.custom_cron_schedule.clone(),
        }
    }
}

/// Parse an all-digit integer within `[min, max]`, recording a labelled error otherwise
pub fn int_in_range(
    value: &str,
    min: u32,
    max: u32,
    label: &str,
    errors: &mut ValidationErrors,
) -> Option<u32> {
    let value = value.trim();

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        errors.push(format!("{} must be an integer ({}-{}).", label, min, max));
        return None;
    }

    // All digits: the only possible parse failure is overflow, which is out of range anyway
    match value.parse::<u32>() {
        Ok(n) if (min..=max).contains(&n) => Some(n),
        _ => {
            errors.push(format!("{} must be between {} and {}.", label, min, max));
            None
        }
    }
}

/// Map a weekday given as `0`-`7`, an abbreviation or a full name to cron's `0`-`6`
pub fn normalize_weekday(value: &str) -> Option<u8> {
    let day = match value.trim().to_lowercase().as_str() {
        "0" | "7" | "sun" | "sunday" => 0,
        "1" | "mon" | "monday" => 1,
        "2" | "tue" | "tues" | "tuesday" => 2,
        "3" | "wed" | "wednesday" => 3,
        "4" | "thu" | "thur" | "thurs" | "thursday" => 4,
        "5" | "fri" | "friday" => 5,
        "6" | "sat" | "saturday" => 6,
        _ => return None,
    };
    Some(day)
}

/// Tabs are allowed between fields; any other control character is not
pub fn cron_is_single_line(cron: &str) -> bool {
    !cron.chars().any(|c| c.is_control() && c != '\t')
}

pub fn cron_has_five_fields(cron: &str) -> bool {
    cron.split_whitespace().count() == 5
}

pub const CUSTOM_CRON_SINGLE_LINE: &str = "Custom cron expression must be a single line.";

/// Derive the cron expression for `intent`.
///
/// Returns an empty string for the disabled mode and whenever a field of the
/// selected mode is invalid; every invalid field is recorded in `errors`.
pub fn derive_cron(intent: &ScheduleIntent, errors: &mut ValidationErrors) -> String {
    let mode = match ScheduleMode::parse(&intent.mode) {
        Some(mode) => mode,
        None => {
            errors.push(format!(
                "Invalid schedule mode '{}'.",
                intent.mode.trim().to_lowercase()
            ));
            return String::new();
        }
    };

    match mode {
        ScheduleMode::Disabled => String::new(),
        ScheduleMode::Minutes => {
            match int_in_range(&intent.every_minutes, 1, 59, "Every N minutes", errors) {
                Some(1) => "* * * * *".to_string(),
                Some(n) => format!("*/{} * * * *", n),
                None => String::new(),
            }
        }
        ScheduleMode::Hourly => {
            match int_in_range(&intent.every_hours, 1, 24, "Every N hours", errors) {
                Some(1) => "0 * * * *".to_string(),
                Some(n) => format!("0 */{} * * *", n),
                None => String::new(),
            }
        }
        ScheduleMode::Daily => {
            let hour = int_in_range(&intent.daily_hour, 0, 23, "Daily hour", errors);
            let minute = int_in_range(&intent.daily_minute, 0, 59, "Daily minute", errors);
            match (hour, minute) {
                (Some(hour), Some(minute)) => format!("{} {} * * *", minute, hour),
                _ => String::new(),
            }
        }
        ScheduleMode::Weekly => {
            let day = normalize_weekday(&intent.weekly_day);
            if day.is_none() {
                errors.push("Weekly day must be 0-6 or a weekday name.");
            }
            let hour = int_in_range(&intent.weekly_hour, 0, 23, "Weekly hour", errors);
            let minute = int_in_range(&intent.weekly_minute, 0, 59, "Weekly minute", errors);
            match (day, hour, minute) {
                (Some(day), Some(hour), Some(minute)) => {
                    format!("{} {} * * {}", minute, hour, day)
                }
                _ => String::new(),
            }
        }
        ScheduleMode::Custom => {
            let cron = intent.custom_cron.trim();
            if cron.is_empty() {
                errors.push("Custom cron mode requires a cron expression.");
                String::new()
            } else if !cron_is_single_line(cron) {
                errors.push(CUSTOM_CRON_SINGLE_LINE);
                String::new()
            } else if !cron_has_five_fields(cron) {
                errors.push("Custom cron expression must have exactly 5 fields.");
                String::new()
            } else {
                cron.to_string()
            }
        }
    }
}

/// Derive the schedule stored in `config`, failing with every validation message
pub fn derive_cron_for(config: &Configuration) -> Result<String> {
    let mut errors = ValidationErrors::new();
    let cron = derive_cron(&ScheduleIntent::from_config(config), &mut errors);
    errors.into_result()?;
    Ok(cron)
}
