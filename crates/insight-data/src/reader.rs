//! CSV export discovery and loading for Badge Insight.
//!
//! Reads semicolon-delimited reader exports from a data directory and turns
//! each data line into an opaque column-label → value map. All semantic
//! interpretation (aliases, date parsing, classification) happens later in
//! the normalizer; this layer only handles transport.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use insight_core::error::{InsightError, Result};
use tracing::{debug, warn};

/// An opaque raw-export row: column label → cell value, as read from disk.
pub type RawRow = HashMap<String, String>;

/// Exports never carry more than twelve meaningful columns; anything past
/// that is trailing delimiter noise and is ignored.
const MAX_COLUMNS: usize = 12;

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.csv` files recursively under `data_path`, sorted by path.
pub fn find_csv_files(data_path: &Path) -> Vec<PathBuf> {
    if !data_path.exists() {
        warn!("Data path does not exist: {}", data_path.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load every export under `data_path` into raw rows, preserving file order
/// then line order.
///
/// The directory must exist; an empty directory yields an empty batch (not
/// an error). A file that cannot be opened fails the whole load, since a
/// partially read batch would silently skew every downstream count.
pub fn load_events(data_path: &Path) -> Result<Vec<RawRow>> {
    if !data_path.exists() {
        return Err(InsightError::DataPathNotFound(data_path.to_path_buf()));
    }

    let csv_files = find_csv_files(data_path);
    if csv_files.is_empty() {
        warn!("No CSV files found in {}", data_path.display());
        return Ok(Vec::new());
    }

    let mut all_rows: Vec<RawRow> = Vec::new();
    for file_path in &csv_files {
        let rows = load_raw_rows(file_path)?;
        all_rows.extend(rows);
    }

    debug!(
        "Loaded {} rows from {} files under {}",
        all_rows.len(),
        csv_files.len(),
        data_path.display()
    );

    Ok(all_rows)
}

/// Parse a single semicolon-delimited export file.
///
/// The first non-empty line is the header; every following non-empty line
/// becomes one [`RawRow`]. Cells beyond the header width (or beyond
/// [`MAX_COLUMNS`]) are ignored; short lines simply leave trailing columns
/// absent from the map.
pub fn load_raw_rows(file_path: &Path) -> Result<Vec<RawRow>> {
    let file = std::fs::File::open(file_path).map_err(|source| InsightError::FileRead {
        path: file_path.to_path_buf(),
        source,
    })?;

    let reader = std::io::BufReader::new(file);
    let mut headers: Option<Vec<String>> = None;
    let mut rows: Vec<RawRow> = Vec::new();
    let mut lines_read = 0u64;
    let mut lines_skipped = 0u64;

    for line_result in reader.lines() {
        let line = line_result?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            lines_skipped += 1;
            continue;
        }
        lines_read += 1;

        let cells: Vec<&str> = trimmed.split(';').take(MAX_COLUMNS).collect();

        match &headers {
            None => {
                headers = Some(cells.iter().map(|c| c.trim().to_string()).collect());
            }
            Some(header_row) => {
                let mut row: RawRow = HashMap::with_capacity(header_row.len());
                for (label, value) in header_row.iter().zip(cells.iter()) {
                    row.insert(label.clone(), value.trim().to_string());
                }
                rows.push(row);
            }
        }
    }

    debug!(
        "File {}: {} lines read, {} blank lines skipped, {} rows",
        file_path.display(),
        lines_read,
        lines_skipped,
        rows.len()
    );

    Ok(rows)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_csv(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    const HEADER: &str =
        "Numéro de badge;Date évènements;Heure évènements;Centrale;Lecteur;Nature Evenement;Nom;Prénom";

    // ── find_csv_files ────────────────────────────────────────────────────────

    #[test]
    fn test_find_csv_files_in_flat_dir() {
        let dir = TempDir::new().unwrap();
        write_csv(dir.path(), "a.csv", &[HEADER]);
        write_csv(dir.path(), "b.csv", &[HEADER]);
        write_csv(dir.path(), "notes.txt", &["ignored"]);

        let files = find_csv_files(dir.path());
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_find_csv_files_recursive_and_sorted() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("2024-03");
        std::fs::create_dir_all(&sub).unwrap();
        write_csv(dir.path(), "b.csv", &[HEADER]);
        write_csv(&sub, "a.csv", &[HEADER]);

        let files = find_csv_files(dir.path());
        assert_eq!(files.len(), 2);
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
    }

    #[test]
    fn test_find_csv_files_uppercase_extension() {
        let dir = TempDir::new().unwrap();
        write_csv(dir.path(), "EXPORT.CSV", &[HEADER]);
        assert_eq!(find_csv_files(dir.path()).len(), 1);
    }

    #[test]
    fn test_find_csv_files_nonexistent_path() {
        let files = find_csv_files(Path::new("/tmp/does-not-exist-insight-test-xyz"));
        assert!(files.is_empty());
    }

    // ── load_raw_rows ─────────────────────────────────────────────────────────

    #[test]
    fn test_load_raw_rows_basic() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            dir.path(),
            "export.csv",
            &[
                HEADER,
                "12345;15/03/2024;08:02:11;C1;Entrée Hall;Entrée badge;Durand;Marie",
            ],
        );

        let rows = load_raw_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Numéro de badge").unwrap(), "12345");
        assert_eq!(rows[0].get("Lecteur").unwrap(), "Entrée Hall");
        assert_eq!(rows[0].get("Prénom").unwrap(), "Marie");
    }

    #[test]
    fn test_load_raw_rows_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            dir.path(),
            "export.csv",
            &[
                HEADER,
                "",
                "12345;15/03/2024;08:02:11;C1;R1;Entrée;Durand;Marie",
                "   ",
            ],
        );

        let rows = load_raw_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_load_raw_rows_short_line_leaves_columns_absent() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            dir.path(),
            "export.csv",
            &[HEADER, "12345;15/03/2024;08:02:11"],
        );

        let rows = load_raw_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Heure évènements").unwrap(), "08:02:11");
        assert!(rows[0].get("Lecteur").is_none());
    }

    #[test]
    fn test_load_raw_rows_extra_cells_ignored() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            dir.path(),
            "export.csv",
            &[
                "A;B",
                "1;2;3;4;5;6;7;8;9;10;11;12;13;14",
            ],
        );

        let rows = load_raw_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[0].get("B").unwrap(), "2");
    }

    #[test]
    fn test_load_raw_rows_trims_cells() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(dir.path(), "export.csv", &["A;B", " 1 ;  deux  "]);

        let rows = load_raw_rows(&path).unwrap();
        assert_eq!(rows[0].get("A").unwrap(), "1");
        assert_eq!(rows[0].get("B").unwrap(), "deux");
    }

    // ── load_events ───────────────────────────────────────────────────────────

    #[test]
    fn test_load_events_merges_files_in_path_order() {
        let dir = TempDir::new().unwrap();
        write_csv(dir.path(), "a.csv", &["A;B", "1;x"]);
        write_csv(dir.path(), "b.csv", &["A;B", "2;y"]);

        let rows = load_events(dir.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("A").unwrap(), "1");
        assert_eq!(rows[1].get("A").unwrap(), "2");
    }

    #[test]
    fn test_load_events_missing_dir_is_fatal() {
        let err = load_events(Path::new("/tmp/does-not-exist-insight-test-xyz")).unwrap_err();
        assert!(err.to_string().contains("Data path not found"));
    }

    #[test]
    fn test_load_events_empty_dir_yields_empty_batch() {
        let dir = TempDir::new().unwrap();
        let rows = load_events(dir.path()).unwrap();
        assert!(rows.is_empty());
    }
}
