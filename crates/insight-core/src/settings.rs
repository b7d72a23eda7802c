use clap::Parser;
use std::path::PathBuf;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Attendance intelligence over badge-reader access events
#[derive(Parser, Debug, Clone)]
#[command(
    name = "badge-insight",
    about = "Attendance intelligence over badge-reader access events",
    version
)]
pub struct Settings {
    /// Directory containing employee reader exports (.csv)
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// Directory containing visitor reader exports (.csv)
    #[arg(long)]
    pub visitors_path: Option<PathBuf>,

    /// Path to the work-calendar policy file (JSON)
    #[arg(long)]
    pub calendar: Option<PathBuf>,

    /// Path to the expected-roster file (JSON); enables ABSENT detection
    #[arg(long)]
    pub roster: Option<PathBuf>,

    /// Write the statistics report here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Duplicate-scan window in seconds (1-3600)
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u32).range(1..=3600))]
    pub duplicate_window_secs: u32,

    /// Emit compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse CLI arguments and resolve flag interactions.
    pub fn load() -> Self {
        Self::resolve(Self::parse())
    }

    /// `--debug` overrides the configured log level.
    fn resolve(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
