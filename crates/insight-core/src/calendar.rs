//! Work-calendar collaborator.
//!
//! Attendance policy (expected hours, grace period, holidays, continuous
//! days) lives in an externally managed JSON file, never in code, so that
//! policy changes do not require a release. [`WorkCalendar`] is the
//! read-only view the engine consults; [`CalendarLookup`] is the seam that
//! lets tests substitute a fixed policy.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{InsightError, Result};

// ── CalendarLookup ────────────────────────────────────────────────────────────

/// Read-only calendar queries consulted by the presence engine.
pub trait CalendarLookup {
    fn is_holiday(&self, date: NaiveDate) -> bool;
    /// `true` when `date` is worked without a mandated lunch-break split
    /// for the given group.
    fn is_continuous_day(&self, date: NaiveDate, group: &str) -> bool;
    fn expected_start(&self) -> NaiveTime;
    fn expected_end(&self) -> NaiveTime;
    fn grace_period(&self) -> Duration;
    /// Minimum worked hours for a continuous day to count as
    /// `JOURNEE_CONTINUE`.
    fn continuous_threshold_hours(&self) -> f64;
}

// ── CalendarConfig ────────────────────────────────────────────────────────────

/// Serialized calendar policy, loaded from an admin-managed JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Public holidays; days listed here always derive `JOUR_FERIE`.
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
    /// Expected arrival time.
    #[serde(default = "default_expected_start")]
    pub expected_start: NaiveTime,
    /// Expected departure time.
    #[serde(default = "default_expected_end")]
    pub expected_end: NaiveTime,
    /// Tolerance applied on both sides of the expected window, in minutes.
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: u32,
    /// ISO weekday numbers (1 = Monday .. 7 = Sunday) worked without a
    /// lunch-break split, for groups with no specific override.
    #[serde(default = "default_continuous_days")]
    pub continuous_days: Vec<u32>,
    /// Per-group continuous-day overrides, keyed by group name.
    #[serde(default)]
    pub group_continuous_days: BTreeMap<String, Vec<u32>>,
    /// Minimum worked hours for `JOURNEE_CONTINUE`.
    #[serde(default = "default_continuous_threshold")]
    pub continuous_threshold_hours: f64,
    /// IANA timezone name, or `"auto"` to use the system timezone.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_expected_start() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).expect("valid time")
}

fn default_expected_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).expect("valid time")
}

fn default_grace_minutes() -> u32 {
    5
}

fn default_continuous_days() -> Vec<u32> {
    vec![1, 4, 7]
}

fn default_continuous_threshold() -> f64 {
    6.0
}

fn default_timezone() -> String {
    "auto".to_string()
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            holidays: Vec::new(),
            expected_start: default_expected_start(),
            expected_end: default_expected_end(),
            grace_minutes: default_grace_minutes(),
            continuous_days: default_continuous_days(),
            group_continuous_days: BTreeMap::new(),
            continuous_threshold_hours: default_continuous_threshold(),
            timezone: default_timezone(),
        }
    }
}

impl CalendarConfig {
    /// Load the calendar policy from an explicit JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| InsightError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Atomically write the policy to `path`, creating parent directories
    /// if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }
}

// ── WorkCalendar ──────────────────────────────────────────────────────────────

/// Validated, queryable view of a [`CalendarConfig`].
#[derive(Debug, Clone)]
pub struct WorkCalendar {
    holidays: HashSet<NaiveDate>,
    expected_start: NaiveTime,
    expected_end: NaiveTime,
    grace: Duration,
    continuous_days: Vec<u32>,
    group_continuous_days: BTreeMap<String, Vec<u32>>,
    continuous_threshold_hours: f64,
    timezone: Tz,
}

impl WorkCalendar {
    /// Validate `config` and build the calendar.
    ///
    /// Fails with [`InsightError::Config`] when the expected window is
    /// inverted, a weekday number is out of range, or the timezone name is
    /// unknown. Invalid configuration is a fatal batch precondition.
    pub fn new(config: CalendarConfig) -> Result<Self> {
        if config.expected_end <= config.expected_start {
            return Err(InsightError::Config(format!(
                "expected_end ({}) must be after expected_start ({})",
                config.expected_end, config.expected_start
            )));
        }

        let all_days = config
            .continuous_days
            .iter()
            .chain(config.group_continuous_days.values().flatten());
        for day in all_days {
            if !(1..=7).contains(day) {
                return Err(InsightError::Config(format!(
                    "continuous day {} out of range (1 = Monday .. 7 = Sunday)",
                    day
                )));
            }
        }

        let tz_name = if config.timezone == "auto" {
            system_timezone()
        } else {
            config.timezone.clone()
        };
        let timezone: Tz = tz_name
            .parse()
            .map_err(|_| InsightError::Config(format!("unknown timezone: {}", tz_name)))?;

        Ok(Self {
            holidays: config.holidays.into_iter().collect(),
            expected_start: config.expected_start,
            expected_end: config.expected_end,
            grace: Duration::minutes(i64::from(config.grace_minutes)),
            continuous_days: config.continuous_days,
            group_continuous_days: config.group_continuous_days,
            continuous_threshold_hours: config.continuous_threshold_hours,
            timezone,
        })
    }

    /// The IANA timezone all window boundaries are expressed in.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

impl CalendarLookup for WorkCalendar {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    fn is_continuous_day(&self, date: NaiveDate, group: &str) -> bool {
        let weekday = date.weekday().number_from_monday();
        let days = self
            .group_continuous_days
            .get(group)
            .unwrap_or(&self.continuous_days);
        days.contains(&weekday)
    }

    fn expected_start(&self) -> NaiveTime {
        self.expected_start
    }

    fn expected_end(&self) -> NaiveTime {
        self.expected_end
    }

    fn grace_period(&self) -> Duration {
        self.grace
    }

    fn continuous_threshold_hours(&self) -> f64 {
        self.continuous_threshold_hours
    }
}

/// Detect the system IANA timezone, falling back to UTC.
pub fn system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn paris_config() -> CalendarConfig {
        CalendarConfig {
            timezone: "Europe/Paris".to_string(),
            ..CalendarConfig::default()
        }
    }

    // ── validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_rejects_inverted_expected_window() {
        let config = CalendarConfig {
            expected_start: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            expected_end: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            ..paris_config()
        };
        let err = WorkCalendar::new(config).unwrap_err();
        assert!(err.to_string().contains("expected_end"));
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let config = CalendarConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..CalendarConfig::default()
        };
        let err = WorkCalendar::new(config).unwrap_err();
        assert!(err.to_string().contains("unknown timezone"));
    }

    #[test]
    fn test_rejects_out_of_range_weekday() {
        let config = CalendarConfig {
            continuous_days: vec![1, 8],
            ..paris_config()
        };
        let err = WorkCalendar::new(config).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_auto_timezone_resolves() {
        let config = CalendarConfig::default();
        // "auto" must resolve to some parseable IANA zone on any host.
        assert!(WorkCalendar::new(config).is_ok());
    }

    // ── lookups ───────────────────────────────────────────────────────────────

    #[test]
    fn test_holiday_lookup() {
        let config = CalendarConfig {
            holidays: vec![date(2024, 5, 1)],
            ..paris_config()
        };
        let calendar = WorkCalendar::new(config).unwrap();
        assert!(calendar.is_holiday(date(2024, 5, 1)));
        assert!(!calendar.is_holiday(date(2024, 5, 2)));
    }

    #[test]
    fn test_continuous_day_default_list() {
        // 2024-03-04 is a Monday (weekday 1), 2024-03-05 a Tuesday.
        let calendar = WorkCalendar::new(paris_config()).unwrap();
        assert!(calendar.is_continuous_day(date(2024, 3, 4), "Production"));
        assert!(!calendar.is_continuous_day(date(2024, 3, 5), "Production"));
    }

    #[test]
    fn test_continuous_day_group_override() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Nuit".to_string(), vec![2]);
        let config = CalendarConfig {
            group_continuous_days: overrides,
            ..paris_config()
        };
        let calendar = WorkCalendar::new(config).unwrap();
        // Tuesday is continuous for "Nuit" only.
        assert!(calendar.is_continuous_day(date(2024, 3, 5), "Nuit"));
        assert!(!calendar.is_continuous_day(date(2024, 3, 5), "Production"));
        // Monday comes from the default list, which "Nuit" no longer uses.
        assert!(!calendar.is_continuous_day(date(2024, 3, 4), "Nuit"));
    }

    #[test]
    fn test_grace_period_from_minutes() {
        let config = CalendarConfig {
            grace_minutes: 15,
            ..paris_config()
        };
        let calendar = WorkCalendar::new(config).unwrap();
        assert_eq!(calendar.grace_period(), Duration::minutes(15));
    }

    // ── persistence ───────────────────────────────────────────────────────────

    #[test]
    fn test_config_save_load_round_trip() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("calendar.json");

        let config = CalendarConfig {
            holidays: vec![date(2024, 7, 14)],
            grace_minutes: 10,
            ..paris_config()
        };
        config.save_to(&path).expect("save");

        let loaded = CalendarConfig::load_from(&path).expect("load");
        assert_eq!(loaded.holidays, vec![date(2024, 7, 14)]);
        assert_eq!(loaded.grace_minutes, 10);
        assert_eq!(loaded.timezone, "Europe/Paris");
    }

    #[test]
    fn test_config_load_missing_file_is_error() {
        let tmp = TempDir::new().expect("tempdir");
        let err = CalendarConfig::load_from(&tmp.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("calendar.json");
        std::fs::write(&path, r#"{"grace_minutes": 20}"#).unwrap();

        let loaded = CalendarConfig::load_from(&path).expect("load");
        assert_eq!(loaded.grace_minutes, 20);
        assert_eq!(loaded.expected_start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(loaded.continuous_days, vec![1, 4, 7]);
    }
}
