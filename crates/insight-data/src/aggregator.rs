//! Batch aggregation into the final statistics report.
//!
//! Consumes the normalized stream, presence records and anomaly list and
//! produces the [`StatisticsReport`]. All grouped outputs are built in
//! `BTreeMap`s and emitted sorted by key, so two runs over the same batch
//! yield byte-identical JSON.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use insight_core::calendar::CalendarLookup;
use insight_core::error::{InsightError, Result};
use insight_core::models::{
    AggregateBucket, AnomalyKind, AnomalyRecord, NormalizedRecord, PersonType, PresenceBucket,
    PresenceRecord, PresenceStats, PresenceStatus, StatisticsReport,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Roster ────────────────────────────────────────────────────────────────────

/// One person expected on site. Cross-referencing the roster is what
/// produces `ABSENT` presence records; without a roster the engine only
/// ever sees days that have events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub badge_number: String,
    pub full_name: String,
    #[serde(default)]
    pub group_name: String,
}

/// Load the expected roster from a JSON file.
pub fn load_roster(path: &Path) -> Result<Vec<RosterEntry>> {
    let content = std::fs::read_to_string(path).map_err(|source| InsightError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

// ── StatsAggregator ───────────────────────────────────────────────────────────

/// Stateless aggregation over one batch.
pub struct StatsAggregator;

impl StatsAggregator {
    /// Build the full statistics report.
    ///
    /// `error_records` is the count of rows rejected by the normalizer, kept
    /// so that `totalRecords + errorRecords` equals the input row count.
    /// When `roster` is given, expected people with no events on a non-holiday
    /// batch day get a synthesized `ABSENT` record.
    pub fn aggregate(
        records: &[NormalizedRecord],
        presence: &[PresenceRecord],
        anomalies: &[AnomalyRecord],
        error_records: u64,
        roster: Option<&[RosterEntry]>,
        calendar: &dyn CalendarLookup,
    ) -> StatisticsReport {
        let employees_records = records
            .iter()
            .filter(|r| r.person_type == PersonType::Employee)
            .count() as u64;
        let visitors_records = records.len() as u64 - employees_records;

        let by_group = Self::count_by(records, |r| bucket_name(&r.group_name));
        let by_day = Self::count_by(records, |r| r.event_date.to_string());
        let by_event_type = Self::count_by(records, |r| r.event_type.label().to_string());
        let by_reader = Self::count_by(records, |r| bucket_name(&r.reader));
        let hourly_traffic = Self::hourly_traffic(records);

        // Person-days flagged missing-counterpart are unreliable duration
        // signals and must not skew the mean.
        let missing_counterpart: HashSet<(&str, NaiveDate)> = anomalies
            .iter()
            .filter(|a| a.kind == AnomalyKind::MissingCounterpart)
            .filter_map(|a| a.date.map(|d| (a.badge_number.as_str(), d)))
            .collect();

        let mut daily: Vec<PresenceRecord> = presence.to_vec();
        if let Some(roster) = roster {
            daily.extend(Self::synthesize_absences(presence, records, roster, calendar));
        }
        daily.sort_by(|a, b| {
            (a.date, a.badge_number.as_str()).cmp(&(b.date, b.badge_number.as_str()))
        });

        let average_time_spent = Self::average_time_spent(&daily, &missing_counterpart);

        let weekly = Self::window_buckets(&daily, |d| {
            let iso = d.iso_week();
            (
                format!("{:04}-W{:02}", iso.year(), iso.week()),
                Some(format!("Semaine {}", iso.week())),
            )
        });
        let monthly = Self::window_buckets(&daily, |d| {
            let week_of_month = d.day0() / 7 + 1;
            (
                format!("{:04}-{:02}-S{}", d.year(), d.month(), week_of_month),
                None,
            )
        });
        let yearly =
            Self::window_buckets(&daily, |d| (format!("{:04}-{:02}", d.year(), d.month()), None));

        debug!(
            "Aggregated {} records, {} person-days, {} anomalies",
            records.len(),
            daily.len(),
            anomalies.len()
        );

        StatisticsReport {
            total_records: records.len() as u64,
            employees_records,
            visitors_records,
            error_records,
            by_group,
            by_day,
            by_event_type,
            by_reader,
            anomalies: anomalies.len() as u64,
            anomaly_details: anomalies.to_vec(),
            hourly_traffic,
            average_time_spent,
            presence_stats: PresenceStats {
                daily,
                weekly,
                monthly,
                yearly,
            },
        }
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Generic frequency-count driver; `key_fn` maps a record to its bucket.
    fn count_by(
        records: &[NormalizedRecord],
        key_fn: impl Fn(&NormalizedRecord) -> String,
    ) -> Vec<AggregateBucket> {
        // BTreeMap for automatically sorted keys.
        let mut map: BTreeMap<String, u64> = BTreeMap::new();
        for record in records {
            *map.entry(key_fn(record)).or_default() += 1;
        }
        map.into_iter()
            .map(|(key, count)| AggregateBucket { key, count })
            .collect()
    }

    /// 24-bucket histogram keyed by hour of day. Hours with no traffic are
    /// kept so consumers always see a full day.
    fn hourly_traffic(records: &[NormalizedRecord]) -> Vec<AggregateBucket> {
        let mut map: BTreeMap<String, u64> = (0..24).map(|h| (format!("{:02}", h), 0)).collect();
        for record in records {
            use chrono::Timelike;
            *map.entry(format!("{:02}", record.event_time.hour()))
                .or_default() += 1;
        }
        map.into_iter()
            .map(|(key, count)| AggregateBucket { key, count })
            .collect()
    }

    /// `ABSENT` records for roster people with no events on a batch day.
    /// Holidays are skipped; nobody is absent on a day off.
    fn synthesize_absences(
        presence: &[PresenceRecord],
        records: &[NormalizedRecord],
        roster: &[RosterEntry],
        calendar: &dyn CalendarLookup,
    ) -> Vec<PresenceRecord> {
        let batch_days: BTreeSet<NaiveDate> = records.iter().map(|r| r.event_date).collect();
        let seen: HashSet<(&str, NaiveDate)> = presence
            .iter()
            .map(|p| (p.badge_number.as_str(), p.date))
            .collect();

        let mut absences: Vec<PresenceRecord> = Vec::new();
        for date in batch_days {
            if calendar.is_holiday(date) {
                continue;
            }
            for person in roster {
                if seen.contains(&(person.badge_number.as_str(), date)) {
                    continue;
                }
                absences.push(PresenceRecord {
                    badge_number: person.badge_number.clone(),
                    full_name: person.full_name.clone(),
                    group_name: person.group_name.clone(),
                    person_type: PersonType::Employee,
                    date,
                    first_badge: None,
                    last_badge: None,
                    total_hours: 0.0,
                    status: PresenceStatus::Absent,
                });
            }
        }
        absences
    }

    /// Mean of totalHours for employees, excluding holidays and
    /// missing-counterpart days.
    fn average_time_spent(
        daily: &[PresenceRecord],
        missing_counterpart: &HashSet<(&str, NaiveDate)>,
    ) -> f64 {
        let mut sum = 0.0;
        let mut count = 0u64;
        for record in daily {
            if record.person_type != PersonType::Employee {
                continue;
            }
            if record.status == PresenceStatus::JourFerie {
                continue;
            }
            if missing_counterpart.contains(&(record.badge_number.as_str(), record.date)) {
                continue;
            }
            sum += record.total_hours;
            count += 1;
        }
        if count == 0 {
            0.0
        } else {
            round2(sum / count as f64)
        }
    }

    /// Generic windowed-summary driver; `key_fn` maps a date to the bucket
    /// key and optional display label. Roster absences carry no worked time
    /// and are excluded from the windows.
    fn window_buckets(
        daily: &[PresenceRecord],
        key_fn: impl Fn(NaiveDate) -> (String, Option<String>),
    ) -> Vec<PresenceBucket> {
        let mut map: BTreeMap<String, PresenceBucket> = BTreeMap::new();
        for record in daily {
            if record.status == PresenceStatus::Absent {
                continue;
            }
            let (key, label) = key_fn(record.date);
            let bucket = map.entry(key.clone()).or_insert_with(|| PresenceBucket {
                key,
                label,
                total_hours: 0.0,
                sample_count: 0,
                average_hours: 0.0,
            });
            bucket.total_hours += record.total_hours;
            bucket.sample_count += 1;
        }

        let mut buckets: Vec<PresenceBucket> = map.into_values().collect();
        for bucket in &mut buckets {
            bucket.total_hours = round2(bucket.total_hours);
            if bucket.sample_count > 0 {
                bucket.average_hours = round2(bucket.total_hours / bucket.sample_count as f64);
            }
        }
        buckets
    }
}

fn bucket_name(value: &str) -> String {
    if value.is_empty() {
        "unknown".to_string()
    } else {
        value.to_string()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ── Tests ─────────────────────────────────────────────────────────────────────
