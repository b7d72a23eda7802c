//! Core types for Badge Insight.
//!
//! Value objects shared across the workspace: normalized access events,
//! presence records, anomaly and error taxonomies, the work-calendar
//! collaborator, date/time parsing helpers and CLI settings.

pub mod calendar;
pub mod error;
pub mod models;
pub mod parsing;
pub mod settings;
