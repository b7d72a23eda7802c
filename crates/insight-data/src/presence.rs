//! Per-person-day presence derivation.
//!
//! Reduces one day's ordered badge events into a [`PresenceRecord`]. The
//! status is derived through an explicit ordered rule list (first matching
//! rule wins) so that adding a status means appending a rule, not threading
//! a new branch through nested conditionals. All thresholds come from the
//! [`CalendarLookup`] collaborator, never from code.

use std::collections::HashSet;

use chrono::NaiveDate;
use insight_core::calendar::CalendarLookup;
use insight_core::error::{InsightError, Result};
use insight_core::models::{BadgePoint, NormalizedRecord, PresenceRecord, PresenceStatus};

// ── Rule table ────────────────────────────────────────────────────────────────

/// Everything a status rule may consult for one person-day.
struct DayContext<'a> {
    date: NaiveDate,
    group: &'a str,
    first: &'a NormalizedRecord,
    last: &'a NormalizedRecord,
    total_hours: f64,
}

struct Rule {
    name: &'static str,
    apply: fn(&DayContext<'_>, &dyn CalendarLookup) -> Option<PresenceStatus>,
}

/// Evaluated top to bottom; the first rule returning `Some` decides.
const RULES: &[Rule] = &[
    Rule {
        name: "holiday",
        apply: |ctx, calendar| {
            calendar
                .is_holiday(ctx.date)
                .then_some(PresenceStatus::JourFerie)
        },
    },
    Rule {
        name: "continuous-day",
        apply: |ctx, calendar| {
            (calendar.is_continuous_day(ctx.date, ctx.group)
                && ctx.total_hours >= calendar.continuous_threshold_hours())
            .then_some(PresenceStatus::JourneeContinue)
        },
    },
    Rule {
        name: "late-arrival",
        apply: |ctx, calendar| {
            let latest_on_time = calendar.expected_start() + calendar.grace_period();
            (ctx.first.event_time > latest_on_time).then_some(PresenceStatus::EnRetard)
        },
    },
    Rule {
        name: "early-departure",
        apply: |ctx, calendar| {
            let earliest_on_time = calendar.expected_end() - calendar.grace_period();
            (ctx.last.event_time < earliest_on_time).then_some(PresenceStatus::PartiTot)
        },
    },
    Rule {
        name: "present",
        apply: |_, _| Some(PresenceStatus::Present),
    },
];

// ── PresenceEngine ────────────────────────────────────────────────────────────

/// Stateless presence derivation over one person-day partition.
pub struct PresenceEngine;

impl PresenceEngine {
    /// Build the presence record for one (person, day) partition.
    ///
    /// `events` must all belong to `badge_number` on `date` and contain at
    /// least one event; an empty partition is a caller-contract violation
    /// reported as [`InsightError::EmptyPersonDay`]. `ABSENT` days are
    /// synthesized by the aggregator from the roster, never here.
    ///
    /// `duplicates` holds the sequence numbers flagged as the repeated scan
    /// of a duplicate pair. Those events stay in the stream and in every
    /// count, but are skipped when picking the day's first/last badge so a
    /// repeated scan seconds after the real one never stretches the day.
    pub fn build_presence(
        badge_number: &str,
        date: NaiveDate,
        events: &[NormalizedRecord],
        calendar: &dyn CalendarLookup,
        duplicates: &HashSet<u64>,
    ) -> Result<PresenceRecord> {
        if events.is_empty() {
            return Err(InsightError::EmptyPersonDay {
                badge_number: badge_number.to_string(),
                date,
            });
        }

        let mut ordered: Vec<&NormalizedRecord> = events.iter().collect();
        ordered.sort_by_key(|e| e.sort_key());

        let mut slots: Vec<&NormalizedRecord> = ordered
            .iter()
            .copied()
            .filter(|e| !duplicates.contains(&e.sequence))
            .collect();
        if slots.is_empty() {
            // Every event flagged; fall back to the full day.
            slots = ordered;
        }
        let first = slots[0];
        let last = slots[slots.len() - 1];

        let total_hours = if first.sequence == last.sequence {
            0.0
        } else {
            let seconds = (last.event_time - first.event_time).num_seconds().max(0);
            round2(seconds as f64 / 3600.0)
        };

        let ctx = DayContext {
            date,
            group: &first.group_name,
            first,
            last,
            total_hours,
        };

        let status = RULES
            .iter()
            .find_map(|rule| (rule.apply)(&ctx, calendar))
            .unwrap_or(PresenceStatus::Present);

        tracing::trace!(
            "badge {} on {}: {} ({:.2}h)",
            badge_number,
            date,
            status,
            total_hours
        );

        Ok(PresenceRecord {
            badge_number: badge_number.to_string(),
            full_name: first.full_name.clone(),
            group_name: first.group_name.clone(),
            person_type: first.person_type,
            date,
            first_badge: Some(badge_point(first)),
            last_badge: Some(badge_point(last)),
            total_hours,
            status,
        })
    }

    /// Names of the status rules, in evaluation order.
    pub fn rule_names() -> Vec<&'static str> {
        RULES.iter().map(|r| r.name).collect()
    }
}

fn badge_point(event: &NormalizedRecord) -> BadgePoint {
    BadgePoint {
        time: event.event_time,
        reader: event.reader.clone(),
        direction: event.direction.clone(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ── Tests ─────────────────────────────────────────────────────────────────────
