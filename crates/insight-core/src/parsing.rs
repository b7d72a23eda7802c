//! Date and time parsing for reader-export fields.
//!
//! Reader exports spell dates and times inconsistently across sites
//! (French `DD/MM/YYYY`, ISO `YYYY-MM-DD`, two-digit years, occasional
//! trailing time fragments). Each parser tries a fixed list of formats in
//! order and returns `None` when nothing matches; callers turn that into a
//! row-level [`ProcessingError`](crate::models::ProcessingError).

use chrono::{NaiveDate, NaiveTime};

// ── DateParser ────────────────────────────────────────────────────────────────

/// Stateless parser for calendar-date fields.
pub struct DateParser;

impl DateParser {
    /// Formats tried in order; first match wins.
    const FORMATS: &'static [&'static str] = &["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%d/%m/%y"];

    /// Parse a date string, tolerating a trailing time fragment
    /// (e.g. `"01/02/2024 08:15:00"`).
    pub fn parse(raw: &str) -> Option<NaiveDate> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        // Keep only the date part when a time fragment is appended.
        let date_part = trimmed.split_whitespace().next().unwrap_or(trimmed);

        for format in Self::FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
                return Some(date);
            }
        }
        None
    }
}

// ── TimeParser ────────────────────────────────────────────────────────────────

/// Stateless parser for time-of-day fields.
pub struct TimeParser;

impl TimeParser {
    const FORMATS: &'static [&'static str] = &["%H:%M:%S", "%H:%M"];

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        for format in Self::FORMATS {
            if let Ok(time) = NaiveTime::parse_from_str(trimmed, format) {
                return Some(time);
            }
        }
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
