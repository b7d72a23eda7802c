//! Raw-row normalization.
//!
//! Maps heterogeneous reader-export rows into [`NormalizedRecord`]s. Column
//! labels vary across sites (accented French headers, English snake_case,
//! camelCase); each canonical field carries a fixed ordered alias list and
//! the first label present in the row wins. Rows missing a required field
//! or carrying an unparseable date/time become [`ProcessingError`]s and the
//! batch continues.

use insight_core::models::{
    classify_event_nature, NormalizedRecord, PersonType, ProcessingError, ProcessingErrorKind,
};
use insight_core::parsing::{DateParser, TimeParser};
use tracing::debug;

use crate::reader::RawRow;

/// A raw row tagged with the source it was loaded from. The employee /
/// visitor distinction is supplied by the caller, never inferred from row
/// content.
#[derive(Debug, Clone)]
pub struct SourcedRow {
    pub values: RawRow,
    pub person_type: PersonType,
}

// ── Column aliases ────────────────────────────────────────────────────────────

/// Ordered alias lists for each canonical field; first match wins.
struct ColumnResolver;

impl ColumnResolver {
    const BADGE_NUMBER: &'static [&'static str] = &[
        "Numéro de badge",
        "Numero de badge",
        "badge_number",
        "badgeNumber",
        "Badge",
    ];

    const EVENT_DATE: &'static [&'static str] = &[
        "Date évènements",
        "Date evenements",
        "Date événements",
        "event_date",
        "eventDate",
        "Date",
    ];

    const EVENT_TIME: &'static [&'static str] = &[
        "Heure évènements",
        "Heure evenements",
        "Heure événements",
        "event_time",
        "eventTime",
        "Heure",
    ];

    const TERMINAL: &'static [&'static str] = &["Centrale", "terminal", "controller", "central"];

    const READER: &'static [&'static str] = &["Lecteur", "reader"];

    const EVENT_NATURE: &'static [&'static str] = &[
        "Nature Evenement",
        "Nature Évènement",
        "Nature Evènement",
        "event_nature",
        "eventType",
        "Nature",
    ];

    const LAST_NAME: &'static [&'static str] = &["Nom", "last_name", "lastName"];

    const FIRST_NAME: &'static [&'static str] = &["Prénom", "Prenom", "first_name", "firstName"];

    const FULL_NAME: &'static [&'static str] = &["Nom complet", "full_name", "fullName", "name"];

    const GROUP: &'static [&'static str] = &["Groupe", "group_name", "groupName", "group"];

    /// Return the first non-empty value among `aliases`, trying exact labels
    /// first and falling back to a case-insensitive scan.
    fn resolve<'a>(row: &'a RawRow, aliases: &[&str]) -> Option<&'a str> {
        for alias in aliases {
            if let Some(value) = row.get(*alias) {
                if !value.is_empty() {
                    return Some(value.as_str());
                }
            }
        }
        for alias in aliases {
            for (label, value) in row {
                if label.eq_ignore_ascii_case(alias) && !value.is_empty() {
                    return Some(value.as_str());
                }
            }
        }
        None
    }
}

// ── Normalizer ────────────────────────────────────────────────────────────────

/// Stateless row normalizer. Pure mapping: the same rows in the same order
/// always produce identical output.
pub struct Normalizer;

impl Normalizer {
    /// Map raw rows into normalized records plus row-level errors.
    ///
    /// A row's `sequence` is its zero-based index in `rows`; it is both the
    /// timestamp tie-break and the diagnostic back-reference to the raw row.
    pub fn normalize(rows: &[SourcedRow]) -> (Vec<NormalizedRecord>, Vec<ProcessingError>) {
        let mut records: Vec<NormalizedRecord> = Vec::with_capacity(rows.len());
        let mut errors: Vec<ProcessingError> = Vec::new();

        for (index, sourced) in rows.iter().enumerate() {
            match Self::normalize_row(&sourced.values, sourced.person_type, index as u64) {
                Ok(record) => records.push(record),
                Err(error) => errors.push(error),
            }
        }

        debug!(
            "Normalized {} of {} rows ({} rejected)",
            records.len(),
            rows.len(),
            errors.len()
        );

        (records, errors)
    }

    fn normalize_row(
        row: &RawRow,
        person_type: PersonType,
        sequence: u64,
    ) -> std::result::Result<NormalizedRecord, ProcessingError> {
        let badge_number = Self::required(row, ColumnResolver::BADGE_NUMBER, "badge number", sequence)?;
        let date_raw = Self::required(row, ColumnResolver::EVENT_DATE, "event date", sequence)?;
        let time_raw = Self::required(row, ColumnResolver::EVENT_TIME, "event time", sequence)?;

        let event_date = DateParser::parse(&date_raw).ok_or_else(|| ProcessingError {
            row_index: sequence,
            kind: ProcessingErrorKind::UnparseableDate,
            detail: format!("unparseable event date: {:?}", date_raw),
        })?;

        let event_time = TimeParser::parse(&time_raw).ok_or_else(|| ProcessingError {
            row_index: sequence,
            kind: ProcessingErrorKind::UnparseableTime,
            detail: format!("unparseable event time: {:?}", time_raw),
        })?;

        let nature = ColumnResolver::resolve(row, ColumnResolver::EVENT_NATURE).unwrap_or("");
        let event_type = classify_event_nature(nature);

        let reader = Self::optional(row, ColumnResolver::READER);
        let terminal = Self::optional(row, ColumnResolver::TERMINAL);
        let group_name = Self::optional(row, ColumnResolver::GROUP);
        let full_name = Self::full_name(row);

        Ok(NormalizedRecord {
            badge_number,
            person_type,
            event_date,
            event_time,
            event_type,
            reader,
            terminal,
            group_name,
            full_name,
            direction: event_type.direction().to_string(),
            sequence,
        })
    }

    fn required(
        row: &RawRow,
        aliases: &[&str],
        field: &str,
        sequence: u64,
    ) -> std::result::Result<String, ProcessingError> {
        ColumnResolver::resolve(row, aliases)
            .map(|v| v.to_string())
            .ok_or_else(|| ProcessingError {
                row_index: sequence,
                kind: ProcessingErrorKind::MissingRequiredField,
                detail: format!("missing {}", field),
            })
    }

    fn optional(row: &RawRow, aliases: &[&str]) -> String {
        ColumnResolver::resolve(row, aliases)
            .unwrap_or_default()
            .to_string()
    }

    /// Build the full name from first + last name, falling back to a combined
    /// name column when the split columns are absent.
    fn full_name(row: &RawRow) -> String {
        let first = ColumnResolver::resolve(row, ColumnResolver::FIRST_NAME).unwrap_or("");
        let last = ColumnResolver::resolve(row, ColumnResolver::LAST_NAME).unwrap_or("");
        let combined = format!("{} {}", first, last).trim().to_string();
        if !combined.is_empty() {
            return combined;
        }
        Self::optional(row, ColumnResolver::FULL_NAME)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
