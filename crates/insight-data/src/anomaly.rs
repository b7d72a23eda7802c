//! Anomaly detection over the normalized event stream.
//!
//! Scans each person-day in chronological order and flags duplicate scans,
//! exits recorded before the day's first entry, and days missing the
//! counterpart badge type. Anomalies are informational: flagged events stay
//! in the stream and the batch never halts.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use insight_core::models::{
    AnomalyKind, AnomalyRecord, AnomalySeverity, EventType, NormalizedRecord,
};
use tracing::debug;

/// Default duplicate-scan window, in seconds.
pub const DEFAULT_DUPLICATE_WINDOW_SECS: u32 = 60;

// ── AnomalyDetector ───────────────────────────────────────────────────────────

/// Per-person, per-day scanner over the normalized stream.
pub struct AnomalyDetector {
    duplicate_window: Duration,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DUPLICATE_WINDOW_SECS)
    }
}

impl AnomalyDetector {
    pub fn new(duplicate_window_secs: u32) -> Self {
        Self {
            duplicate_window: Duration::seconds(i64::from(duplicate_window_secs)),
        }
    }

    /// Detect all anomalies in `records`.
    ///
    /// Output is deterministic: badges ascending, dates ascending, and within
    /// a day the order events occur in the stream.
    pub fn detect(&self, records: &[NormalizedRecord]) -> Vec<AnomalyRecord> {
        let mut partitions: BTreeMap<(&str, NaiveDate), Vec<&NormalizedRecord>> = BTreeMap::new();
        for record in records {
            partitions
                .entry((record.badge_number.as_str(), record.event_date))
                .or_default()
                .push(record);
        }

        let mut anomalies: Vec<AnomalyRecord> = Vec::new();
        for ((badge, date), mut events) in partitions {
            events.sort_by_key(|e| e.sort_key());
            self.detect_duplicates(badge, date, &events, &mut anomalies);
            Self::detect_out_of_order(badge, date, &events, &mut anomalies);
            Self::detect_missing_counterpart(badge, date, &events, &mut anomalies);
        }

        debug!(
            "Detected {} anomalies across {} records",
            anomalies.len(),
            records.len()
        );

        anomalies
    }

    /// Two consecutive events with identical (reader, eventType) within the
    /// duplicate window. The later event is flagged but kept in the stream.
    fn detect_duplicates(
        &self,
        badge: &str,
        date: NaiveDate,
        events: &[&NormalizedRecord],
        out: &mut Vec<AnomalyRecord>,
    ) {
        for pair in events.windows(2) {
            let (prev, cur) = (pair[0], pair[1]);
            if prev.reader != cur.reader || prev.event_type != cur.event_type {
                continue;
            }
            let delta = cur.event_time - prev.event_time;
            if delta <= self.duplicate_window {
                out.push(AnomalyRecord {
                    kind: AnomalyKind::DuplicateScan,
                    severity: AnomalySeverity::Warning,
                    badge_number: badge.to_string(),
                    date: Some(date),
                    sequences: vec![prev.sequence, cur.sequence],
                    detail: format!(
                        "duplicate {} scan on reader {:?} within {}s",
                        cur.event_type,
                        cur.reader,
                        delta.num_seconds()
                    ),
                });
            }
        }
    }

    /// An exit recorded before the day's first entry. Presence derivation
    /// still uses timestamp order, never badge-type order.
    fn detect_out_of_order(
        badge: &str,
        date: NaiveDate,
        events: &[&NormalizedRecord],
        out: &mut Vec<AnomalyRecord>,
    ) {
        let first_entry_time = events
            .iter()
            .find(|e| e.event_type == EventType::Entry)
            .map(|e| e.event_time);
        let Some(first_entry_time) = first_entry_time else {
            return;
        };

        for event in events {
            if event.event_type == EventType::Exit && event.event_time < first_entry_time {
                out.push(AnomalyRecord {
                    kind: AnomalyKind::OutOfOrder,
                    severity: AnomalySeverity::Warning,
                    badge_number: badge.to_string(),
                    date: Some(date),
                    sequences: vec![event.sequence],
                    detail: format!(
                        "exit at {} precedes first entry at {}",
                        event.event_time, first_entry_time
                    ),
                });
            }
        }
    }

    /// A day with entries but no exit, or exits but no entry.
    fn detect_missing_counterpart(
        badge: &str,
        date: NaiveDate,
        events: &[&NormalizedRecord],
        out: &mut Vec<AnomalyRecord>,
    ) {
        let entries = events
            .iter()
            .filter(|e| e.event_type == EventType::Entry)
            .count();
        let exits = events
            .iter()
            .filter(|e| e.event_type == EventType::Exit)
            .count();

        let missing = match (entries, exits) {
            (0, 0) => return, // only unknown events; nothing to pair
            (_, 0) => "exit",
            (0, _) => "entry",
            _ => return,
        };

        out.push(AnomalyRecord {
            kind: AnomalyKind::MissingCounterpart,
            severity: AnomalySeverity::Info,
            badge_number: badge.to_string(),
            date: Some(date),
            sequences: events.iter().map(|e| e.sequence).collect(),
            detail: format!("no {} badge recorded for the day", missing),
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use insight_core::models::PersonType;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn make_record(
        badge: &str,
        time: (u32, u32, u32),
        event_type: EventType,
        reader: &str,
        sequence: u64,
    ) -> NormalizedRecord {
        NormalizedRecord {
            badge_number: badge.to_string(),
            person_type: PersonType::Employee,
            event_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            event_time: NaiveTime::from_hms_opt(time.0, time.1, time.2).unwrap(),
            event_type,
            reader: reader.to_string(),
            terminal: "C1".to_string(),
            group_name: "Production".to_string(),
            full_name: "Marie Durand".to_string(),
            direction: event_type.direction().to_string(),
            sequence,
        }
    }

    fn kinds(anomalies: &[AnomalyRecord]) -> Vec<AnomalyKind> {
        anomalies.iter().map(|a| a.kind).collect()
    }

    // ── duplicate-scan ────────────────────────────────────────────────────────

    #[test]
    fn test_duplicate_within_window_flagged() {
        let records = vec![
            make_record("B3", (8, 0, 0), EventType::Entry, "Hall", 0),
            make_record("B3", (8, 0, 30), EventType::Entry, "Hall", 1),
            make_record("B3", (17, 0, 0), EventType::Exit, "Hall", 2),
        ];
        let anomalies = AnomalyDetector::default().detect(&records);
        assert!(kinds(&anomalies).contains(&AnomalyKind::DuplicateScan));

        let dup = anomalies
            .iter()
            .find(|a| a.kind == AnomalyKind::DuplicateScan)
            .unwrap();
        assert_eq!(dup.sequences, vec![0, 1]);
        assert_eq!(dup.badge_number, "B3");
    }

    #[test]
    fn test_duplicate_outside_window_not_flagged() {
        let records = vec![
            make_record("B1", (8, 0, 0), EventType::Entry, "Hall", 0),
            make_record("B1", (8, 5, 0), EventType::Entry, "Hall", 1),
            make_record("B1", (17, 0, 0), EventType::Exit, "Hall", 2),
        ];
        let anomalies = AnomalyDetector::default().detect(&records);
        assert!(!kinds(&anomalies).contains(&AnomalyKind::DuplicateScan));
    }

    #[test]
    fn test_duplicate_different_reader_not_flagged() {
        let records = vec![
            make_record("B1", (8, 0, 0), EventType::Entry, "Hall", 0),
            make_record("B1", (8, 0, 20), EventType::Entry, "Parking", 1),
            make_record("B1", (17, 0, 0), EventType::Exit, "Hall", 2),
        ];
        let anomalies = AnomalyDetector::default().detect(&records);
        assert!(!kinds(&anomalies).contains(&AnomalyKind::DuplicateScan));
    }

    #[test]
    fn test_duplicate_window_is_configurable() {
        let records = vec![
            make_record("B1", (8, 0, 0), EventType::Entry, "Hall", 0),
            make_record("B1", (8, 2, 0), EventType::Entry, "Hall", 1),
            make_record("B1", (17, 0, 0), EventType::Exit, "Hall", 2),
        ];
        // 120 s apart: flagged only with a widened window.
        assert!(!kinds(&AnomalyDetector::new(60).detect(&records))
            .contains(&AnomalyKind::DuplicateScan));
        assert!(kinds(&AnomalyDetector::new(180).detect(&records))
            .contains(&AnomalyKind::DuplicateScan));
    }

    // ── out-of-order ──────────────────────────────────────────────────────────

    #[test]
    fn test_exit_before_first_entry_flagged() {
        let records = vec![
            make_record("B1", (7, 55, 0), EventType::Exit, "Hall", 0),
            make_record("B1", (8, 0, 0), EventType::Entry, "Hall", 1),
            make_record("B1", (17, 0, 0), EventType::Exit, "Hall", 2),
        ];
        let anomalies = AnomalyDetector::default().detect(&records);
        let ooo: Vec<_> = anomalies
            .iter()
            .filter(|a| a.kind == AnomalyKind::OutOfOrder)
            .collect();
        assert_eq!(ooo.len(), 1);
        assert_eq!(ooo[0].sequences, vec![0]);
    }

    #[test]
    fn test_exit_after_entry_not_flagged() {
        let records = vec![
            make_record("B1", (8, 0, 0), EventType::Entry, "Hall", 0),
            make_record("B1", (17, 0, 0), EventType::Exit, "Hall", 1),
        ];
        let anomalies = AnomalyDetector::default().detect(&records);
        assert!(!kinds(&anomalies).contains(&AnomalyKind::OutOfOrder));
    }

    // ── missing-counterpart ───────────────────────────────────────────────────

    #[test]
    fn test_entry_without_exit_flagged() {
        let records = vec![make_record("B2", (9, 10, 0), EventType::Entry, "Hall", 0)];
        let anomalies = AnomalyDetector::default().detect(&records);
        let missing = anomalies
            .iter()
            .find(|a| a.kind == AnomalyKind::MissingCounterpart)
            .unwrap();
        assert!(missing.detail.contains("exit"));
        assert_eq!(missing.severity, AnomalySeverity::Info);
    }

    #[test]
    fn test_exit_without_entry_flagged() {
        let records = vec![make_record("B2", (17, 0, 0), EventType::Exit, "Hall", 0)];
        let anomalies = AnomalyDetector::default().detect(&records);
        let missing = anomalies
            .iter()
            .find(|a| a.kind == AnomalyKind::MissingCounterpart)
            .unwrap();
        assert!(missing.detail.contains("entry"));
    }

    #[test]
    fn test_paired_day_not_flagged() {
        let records = vec![
            make_record("B1", (8, 0, 0), EventType::Entry, "Hall", 0),
            make_record("B1", (17, 30, 0), EventType::Exit, "Hall", 1),
        ];
        let anomalies = AnomalyDetector::default().detect(&records);
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_unknown_only_day_not_flagged() {
        let records = vec![make_record("B1", (8, 0, 0), EventType::Unknown, "Hall", 0)];
        let anomalies = AnomalyDetector::default().detect(&records);
        assert!(anomalies.is_empty());
    }

    // ── grouping / determinism ────────────────────────────────────────────────

    #[test]
    fn test_anomalies_grouped_per_badge() {
        // Two different badges scanning the same reader close together must
        // not be mistaken for duplicates of each other.
        let records = vec![
            make_record("B1", (8, 0, 0), EventType::Entry, "Hall", 0),
            make_record("B2", (8, 0, 10), EventType::Entry, "Hall", 1),
            make_record("B1", (17, 0, 0), EventType::Exit, "Hall", 2),
            make_record("B2", (17, 0, 0), EventType::Exit, "Hall", 3),
        ];
        let anomalies = AnomalyDetector::default().detect(&records);
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_detect_is_deterministic() {
        let records = vec![
            make_record("B2", (17, 0, 0), EventType::Exit, "Hall", 0),
            make_record("B1", (9, 10, 0), EventType::Entry, "Hall", 1),
        ];
        let detector = AnomalyDetector::default();
        assert_eq!(detector.detect(&records), detector.detect(&records));
    }
}
