//! Content settings: reset schedule, lockout and contribution rules, sweeps.
//!
//! Settings come from an optional JSON file, then environment overrides.
//! Malformed input is an error; nothing is silently defaulted once a value
//! has been supplied.

use std::path::Path;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use timegate_domain::{ContributionRules, LockoutRules, ResetClock, UnarmedSchedulePolicy};

/// Path of the JSON settings file.
pub const SETTINGS_PATH_VAR: &str = "TIMEGATE_SETTINGS_PATH";
pub const TICK_SECONDS_VAR: &str = "TIMEGATE_TICK_SECONDS";
pub const TERMINAL_TTL_HOURS_VAR: &str = "TIMEGATE_TERMINAL_TTL_HOURS";
pub const WEEKLY_RESET_DAY_VAR: &str = "TIMEGATE_WEEKLY_RESET_DAY";
/// Hour of day (UTC) for both the weekly and daily reset.
pub const RESET_HOUR_VAR: &str = "TIMEGATE_RESET_HOUR";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {var}: {value:?}")]
    InvalidOverride { var: &'static str, value: String },
    #[error("Invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerSettings {
    /// Whether schedules that were never armed fire on the next sweep
    pub unarmed: UnarmedSchedulePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldBossSettings {
    /// Window length after a kill when a boss never had a window
    pub default_window_minutes: u32,
}

impl Default for WorldBossSettings {
    fn default() -> Self {
        Self {
            default_window_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SweepSettings {
    pub tick_seconds: u64,
    /// How long finished event instances are kept before purging
    pub terminal_ttl_hours: u32,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            tick_seconds: 30,
            terminal_ttl_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentSettings {
    pub reset: ResetClock,
    pub lockouts: LockoutRules,
    pub contribution: ContributionRules,
    pub scheduler: SchedulerSettings,
    pub world_boss: WorldBossSettings,
    pub sweep: SweepSettings,
}

impl ContentSettings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Load from `TIMEGATE_SETTINGS_PATH` (defaults when unset), then apply
    /// environment overrides.
    pub fn from_env() -> Result<Self, SettingsError> {
        let mut settings = match std::env::var(SETTINGS_PATH_VAR) {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        settings.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(settings)
    }

    /// Apply overrides looked up by variable name, then re-validate.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SettingsError> {
        if let Some(value) = lookup(TICK_SECONDS_VAR) {
            self.sweep.tick_seconds = parse_override(TICK_SECONDS_VAR, &value)?;
        }
        if let Some(value) = lookup(TERMINAL_TTL_HOURS_VAR) {
            self.sweep.terminal_ttl_hours = parse_override(TERMINAL_TTL_HOURS_VAR, &value)?;
        }
        if let Some(value) = lookup(WEEKLY_RESET_DAY_VAR) {
            self.reset.weekly_day = value.trim().parse::<Weekday>().map_err(|_| {
                SettingsError::InvalidOverride {
                    var: WEEKLY_RESET_DAY_VAR,
                    value: value.clone(),
                }
            })?;
        }
        if let Some(value) = lookup(RESET_HOUR_VAR) {
            let hour: u32 = parse_override(RESET_HOUR_VAR, &value)?;
            let time = NaiveTime::from_hms_opt(hour, 0, 0).ok_or_else(|| {
                SettingsError::InvalidOverride {
                    var: RESET_HOUR_VAR,
                    value: value.clone(),
                }
            })?;
            self.reset.weekly_time = time;
            self.reset.daily_time = time;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.lockouts
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        self.contribution
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        if self.sweep.tick_seconds == 0 {
            return Err(SettingsError::Invalid(
                "sweep tick interval must be positive".into(),
            ));
        }
        if self.world_boss.default_window_minutes == 0 {
            return Err(SettingsError::Invalid(
                "default world boss window must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep.tick_seconds)
    }

    pub fn terminal_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.sweep.terminal_ttl_hours))
    }

    pub fn default_boss_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.world_boss.default_window_minutes))
    }
}

fn parse_override<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, SettingsError> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidOverride {
            var,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use timegate_domain::InstanceDifficulty;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let settings = ContentSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.reset.weekly_day, Weekday::Tue);
        assert_eq!(settings.tick_interval(), std::time::Duration::from_secs(30));
        assert_eq!(settings.scheduler.unarmed, UnarmedSchedulePolicy::FireImmediately);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let settings = ContentSettings::from_json_str(
            r#"{
                "lockouts": {
                    "dungeonMinutes": { "normal": 30, "veteran": 90 },
                    "maxExtensions": null
                },
                "scheduler": { "unarmed": "wait_for_arm" }
            }"#,
        )
        .expect("parse");

        assert_eq!(
            settings.lockouts.dungeon_minutes.get(&InstanceDifficulty::Veteran),
            Some(&90)
        );
        assert_eq!(settings.lockouts.max_extensions, None);
        assert_eq!(settings.lockouts.diminishing_start, 5);
        assert_eq!(settings.scheduler.unarmed, UnarmedSchedulePolicy::WaitForArm);
        assert_eq!(settings.contribution, ContributionRules::default());
    }

    #[test]
    fn invalid_rules_are_rejected() {
        let result = ContentSettings::from_json_str(r#"{ "lockouts": { "diminishingDecay": 1.5 } }"#);
        assert!(matches!(result, Err(SettingsError::Invalid(_))));

        let result = ContentSettings::from_json_str(r#"{ "sweep": { "tickSeconds": "often" } }"#);
        assert!(matches!(result, Err(SettingsError::Parse(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "sweep": {{ "tickSeconds": 5, "terminalTtlHours": 2 }} }}"#)
            .expect("write");

        let settings = ContentSettings::load(file.path()).expect("load");
        assert_eq!(settings.sweep.tick_seconds, 5);
        assert_eq!(settings.terminal_ttl(), chrono::Duration::hours(2));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = ContentSettings::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(SettingsError::Io { .. })));
    }

    #[test]
    fn env_overrides_apply_and_validate() {
        let mut settings = ContentSettings::default();
        settings
            .apply_overrides(lookup(&[
                (TICK_SECONDS_VAR, "10"),
                (WEEKLY_RESET_DAY_VAR, "wed"),
                (RESET_HOUR_VAR, "4"),
            ]))
            .expect("overrides");

        assert_eq!(settings.sweep.tick_seconds, 10);
        assert_eq!(settings.reset.weekly_day, Weekday::Wed);
        let four = NaiveTime::from_hms_opt(4, 0, 0).expect("valid time");
        assert_eq!(settings.reset.weekly_time, four);
        assert_eq!(settings.reset.daily_time, four);
    }

    #[test]
    fn malformed_overrides_are_errors() {
        for (var, value) in [
            (TICK_SECONDS_VAR, "soon"),
            (RESET_HOUR_VAR, "25"),
            (WEEKLY_RESET_DAY_VAR, "someday"),
            (TICK_SECONDS_VAR, "0"),
        ] {
            let mut settings = ContentSettings::default();
            assert!(
                settings.apply_overrides(lookup(&[(var, value)])).is_err(),
                "{var}={value} should be rejected"
            );
        }
    }
}
