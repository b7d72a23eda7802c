//! Data models for Badge Insight.
//!
//! Canonical value objects produced and consumed by the engine: normalized
//! access events, per-day presence records, anomaly and row-error records,
//! and the final statistics report. Field names on serialized types are
//! camelCase to stay compatible with the existing report consumers.

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ── Person / event classification ─────────────────────────────────────────────

/// Origin of a badge holder. Supplied by the caller per raw-row source,
/// never inferred from row content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonType {
    Employee,
    Visitor,
}

impl std::fmt::Display for PersonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersonType::Employee => write!(f, "employee"),
            PersonType::Visitor => write!(f, "visitor"),
        }
    }
}

/// Directionally classified event type, inferred from the free-text
/// "nature d'évènement" column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Entry,
    Exit,
    Unknown,
}

impl EventType {
    /// Stable label used as the aggregation bucket key.
    pub fn label(&self) -> &'static str {
        match self {
            EventType::Entry => "entry",
            EventType::Exit => "exit",
            EventType::Unknown => "unknown",
        }
    }

    /// Direction string carried on the normalized record.
    pub fn direction(&self) -> &'static str {
        match self {
            EventType::Entry => "in",
            EventType::Exit => "out",
            EventType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

fn entry_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)entr[ée]e|arrival|\bin\b|input").expect("valid regex"))
}

fn exit_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)sortie|departure|\bout\b|output").expect("valid regex"))
}

/// Classify a free-text event nature into an [`EventType`].
///
/// Recognises the French and English spellings seen in reader exports
/// (accented or not). Unmatched text yields [`EventType::Unknown`], which is
/// still aggregated, never treated as an error.
pub fn classify_event_nature(nature: &str) -> EventType {
    if entry_pattern().is_match(nature) {
        EventType::Entry
    } else if exit_pattern().is_match(nature) {
        EventType::Exit
    } else {
        EventType::Unknown
    }
}

// ── NormalizedRecord ──────────────────────────────────────────────────────────

/// A raw reader-export row mapped into the canonical shape.
///
/// `sequence` is the zero-based appearance index of the originating raw row
/// within the batch; it doubles as the deterministic tie-break for events
/// sharing the same timestamp and as the back-reference to the raw row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub badge_number: String,
    pub person_type: PersonType,
    pub event_date: NaiveDate,
    pub event_time: NaiveTime,
    pub event_type: EventType,
    pub reader: String,
    pub terminal: String,
    pub group_name: String,
    pub full_name: String,
    pub direction: String,
    pub sequence: u64,
}

impl NormalizedRecord {
    /// Total-order key: (eventDate, eventTime, file-appearance-index).
    pub fn sort_key(&self) -> (NaiveDate, NaiveTime, u64) {
        (self.event_date, self.event_time, self.sequence)
    }
}

// ── ProcessingError ───────────────────────────────────────────────────────────

/// Why a raw row was excluded from the normalized stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingErrorKind {
    MissingRequiredField,
    UnparseableDate,
    UnparseableTime,
}

/// A row-level, non-fatal processing failure. Collected and counted,
/// never aborting the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingError {
    /// Zero-based appearance index of the offending raw row.
    pub row_index: u64,
    pub kind: ProcessingErrorKind,
    pub detail: String,
}

// ── Presence ──────────────────────────────────────────────────────────────────

/// Derived presence status for one person-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceStatus {
    #[serde(rename = "PRESENT")]
    Present,
    #[serde(rename = "ABSENT")]
    Absent,
    #[serde(rename = "EN_RETARD")]
    EnRetard,
    #[serde(rename = "PARTI_TOT")]
    PartiTot,
    #[serde(rename = "JOUR_FERIE")]
    JourFerie,
    #[serde(rename = "JOURNEE_CONTINUE")]
    JourneeContinue,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PresenceStatus::Present => "PRESENT",
            PresenceStatus::Absent => "ABSENT",
            PresenceStatus::EnRetard => "EN_RETARD",
            PresenceStatus::PartiTot => "PARTI_TOT",
            PresenceStatus::JourFerie => "JOUR_FERIE",
            PresenceStatus::JourneeContinue => "JOURNEE_CONTINUE",
        };
        write!(f, "{}", s)
    }
}

/// Projection of an [`AccessEvent`](NormalizedRecord) onto the first/last
/// badge slots of a presence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgePoint {
    pub time: NaiveTime,
    pub reader: String,
    pub direction: String,
}

/// One person-day presence record. Constructed once from the day's ordered
/// events; immutable after construction.
///
/// `first_badge` / `last_badge` are `None` only for roster-derived `ABSENT`
/// days, which carry no events at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub badge_number: String,
    pub full_name: String,
    pub group_name: String,
    pub person_type: PersonType,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_badge: Option<BadgePoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_badge: Option<BadgePoint>,
    pub total_hours: f64,
    pub status: PresenceStatus,
}

// ── Anomalies ─────────────────────────────────────────────────────────────────

/// Data-quality signal categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnomalyKind {
    DuplicateScan,
    OutOfOrder,
    MissingCounterpart,
    UnparseableRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Info,
    Warning,
}

/// An informational data-quality flag attached to one or more events.
/// Flagged events stay in the stream; anomalies never drop data.
///
/// `date` is `None` only for `unparseable-row` anomalies, whose date field
/// never parsed in the first place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyRecord {
    pub kind: AnomalyKind,
    pub severity: AnomalySeverity,
    pub badge_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Sequence numbers of the offending event(s).
    pub sequences: Vec<u64>,
    pub detail: String,
}

// ── Aggregation output ────────────────────────────────────────────────────────

/// A (key, count) pair used uniformly for all grouped counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateBucket {
    pub key: String,
    pub count: u64,
}

/// One windowed presence summary bucket (weekly / monthly / yearly).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceBucket {
    /// Sortable window key, e.g. `"2024-W07"` or `"2024-03"`.
    pub key: String,
    /// Human label shown by the dashboards, e.g. `"Semaine 7"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub total_hours: f64,
    pub sample_count: u64,
    pub average_hours: f64,
}

/// Multi-granularity presence summaries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PresenceStats {
    pub daily: Vec<PresenceRecord>,
    pub weekly: Vec<PresenceBucket>,
    pub monthly: Vec<PresenceBucket>,
    pub yearly: Vec<PresenceBucket>,
}

/// The complete statistics object returned for one batch.
///
/// Field names and nesting are frozen for compatibility with existing
/// consumers of the report JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    pub total_records: u64,
    pub employees_records: u64,
    pub visitors_records: u64,
    pub error_records: u64,
    pub by_group: Vec<AggregateBucket>,
    pub by_day: Vec<AggregateBucket>,
    pub by_event_type: Vec<AggregateBucket>,
    pub by_reader: Vec<AggregateBucket>,
    pub anomalies: u64,
    pub anomaly_details: Vec<AnomalyRecord>,
    pub hourly_traffic: Vec<AggregateBucket>,
    pub average_time_spent: f64,
    pub presence_stats: PresenceStats,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
