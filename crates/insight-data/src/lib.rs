//! Processing engine for Badge Insight.
//!
//! Responsible for discovering and reading reader-export CSV files,
//! normalizing heterogeneous rows, detecting data-quality anomalies,
//! deriving per-person-day presence records and aggregating everything
//! into the final statistics report.

pub mod aggregator;
pub mod analysis;
pub mod anomaly;
pub mod normalizer;
pub mod presence;
pub mod reader;

pub use insight_core as core;
