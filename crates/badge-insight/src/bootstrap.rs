use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the standard `~/.badge-insight/` directory hierarchy exists.
///
/// Creates the following directories if absent (including any missing parents):
/// - `~/.badge-insight/`
/// - `~/.badge-insight/logs/`
/// - `~/.badge-insight/exports/`
pub fn ensure_directories() -> anyhow::Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let insight_dir = home.join(".badge-insight");
    std::fs::create_dir_all(&insight_dir)?;
    std::fs::create_dir_all(insight_dir.join("logs"))?;
    std::fs::create_dir_all(insight_dir.join("exports"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive.
/// Falls back to `"info"` if the level string is not recognised.
///
/// The `log_file` parameter is accepted for forward-compatibility but file
/// logging is not yet wired – all output currently goes to stderr.
pub fn setup_logging(log_level: &str, _log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let normalised = match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" => "warn",
        "ERROR" => "error",
        other => return setup_with(other.to_lowercase()),
    };
    setup_with(normalised.to_string())
}

fn setup_with(directive: String) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer().with_target(false).with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .init();

    Ok(())
}

// ── Data-path discovery ────────────────────────────────────────────────────────

/// Attempt to locate the reader-export directory on the local system.
///
/// Checks the following paths in order and returns the first that exists:
/// 1. `~/.badge-insight/exports/`
/// 2. `~/.local/share/badge-insight/exports/`
///
/// Returns `None` when neither path exists.
pub fn discover_data_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    let candidates = [
        home.join(".badge-insight").join("exports"),
        home.join(".local")
            .join("share")
            .join("badge-insight")
            .join("exports"),
    ];
    candidates.into_iter().find(|p| p.exists())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
