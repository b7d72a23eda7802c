mod bootstrap;

use std::io::Write;

use anyhow::{Context, Result};
use insight_core::calendar::{CalendarConfig, WorkCalendar};
use insight_core::settings::Settings;
use insight_data::aggregator::load_roster;
use insight_data::analysis::analyze_paths;

fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Badge Insight v{} starting", env!("CARGO_PKG_VERSION"));

    // ── Resolve input paths ───────────────────────────────────────────────────
    let data_path = match settings.data_path.clone() {
        Some(path) => path,
        None => bootstrap::discover_data_path()
            .context("no --data-path given and no export directory found")?,
    };
    tracing::info!("Reading exports from {}", data_path.display());

    // ── Attendance policy ─────────────────────────────────────────────────────
    let config = match settings.calendar.as_deref() {
        Some(path) => CalendarConfig::load_from(path)?,
        None => CalendarConfig::default(),
    };
    let calendar = WorkCalendar::new(config)?;
    tracing::info!("Timezone: {}", calendar.timezone());

    // ── Optional roster (enables ABSENT detection) ────────────────────────────
    let roster = settings
        .roster
        .as_deref()
        .map(load_roster)
        .transpose()?;

    // ── Run the pipeline ──────────────────────────────────────────────────────
    let result = analyze_paths(
        &data_path,
        settings.visitors_path.as_deref(),
        &calendar,
        settings.duplicate_window_secs,
        roster.as_deref(),
    )?;

    tracing::info!(
        "Loaded {} rows in {:.2}s, processed in {:.2}s",
        result.metadata.rows_loaded,
        result.metadata.load_time_seconds,
        result.metadata.process_time_seconds
    );
    tracing::info!(
        "{} records ({} errors), {} person-days, {} anomalies",
        result.report.total_records,
        result.report.error_records,
        result.metadata.person_days,
        result.metadata.anomalies_detected
    );

    // ── Emit the report ───────────────────────────────────────────────────────
    let json = if settings.compact {
        serde_json::to_string(&result.report)?
    } else {
        serde_json::to_string_pretty(&result.report)?
    };

    match settings.output {
        Some(path) => {
            std::fs::write(&path, &json)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            tracing::info!("Report written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}
