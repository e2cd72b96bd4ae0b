//! Session discovery on disk.
//!
//! Raw recordings are named `<label>_<dd>_<mm>_<yyyy>_<HH>_<MM>.mat`; the
//! segment after the first underscore encodes the session start time.
//! Scanning a directory yields one catalog entry per parseable filename,
//! sorted ascending by start time. Unparseable names are skipped and
//! reported, never fatal for the scan as a whole.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Filename timestamp layout (`day_month_year_hour_minute`).
pub const TIMESTAMP_FORMAT: &str = "%d_%m_%Y_%H_%M";

/// Extension of raw recording files.
const RAW_EXTENSION: &str = "mat";

/// Identity of one recording run: experiment label plus start time.
///
/// Round-trips with the on-disk naming convention: parsing
/// `BFnovelinac_01_02_2019_15_03.mat` and calling [`SessionId::dir_name`]
/// yields `BFnovelinac_01_02_2019_15_03` again.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId {
    label: String,
    start: NaiveDateTime,
}

impl SessionId {
    /// Parse a session identity from a raw file or session directory path.
    pub fn parse(path: &Path) -> Result<Self, CatalogError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CatalogError::MalformedIdentifier(path.to_path_buf()))?;
        Self::parse_stem(stem).ok_or_else(|| CatalogError::MalformedIdentifier(path.to_path_buf()))
    }

    fn parse_stem(stem: &str) -> Option<Self> {
        let (label, timestamp) = stem.split_once('_')?;
        if label.is_empty() {
            return None;
        }
        let start = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            label: label.to_string(),
            start,
        })
    }

    /// Experiment label (the filename prefix).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Session start time, as parsed from the filename.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Canonical per-session directory name (`label_dd_mm_yyyy_HH_MM`).
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.label, self.start.format(TIMESTAMP_FORMAT))
    }

    /// Human-readable start time for summaries (`YYYY-MM-DD HH:MM`).
    pub fn display_start(&self) -> String {
        self.start.format("%Y-%m-%d %H:%M").to_string()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// One discovered raw recording.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: SessionId,
    pub path: PathBuf,
}

/// A skipped directory entry and the reason it was skipped.
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of scanning a directory for raw recordings.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Parseable recordings, sorted ascending by start time.
    pub sessions: Vec<CatalogEntry>,
    /// Entries whose filename did not match the expected pattern.
    pub skipped: Vec<SkippedEntry>,
}

/// Scan a directory for raw recording files.
///
/// Only `.mat` files are considered. A malformed filename is recorded in
/// [`ScanOutcome::skipped`] with a warning; the scan itself only fails
/// when the directory cannot be read.
pub fn scan(dir: impl AsRef<Path>) -> Result<ScanOutcome, CatalogError> {
    let dir = dir.as_ref();
    let entries =
        std::fs::read_dir(dir).map_err(|e| CatalogError::Io(dir.to_path_buf(), e.to_string()))?;

    let mut outcome = ScanOutcome::default();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let is_raw = path
            .extension()
            .map(|ext| ext == RAW_EXTENSION)
            .unwrap_or(false);
        if !is_raw {
            continue;
        }
        match SessionId::parse(&path) {
            Ok(id) => outcome.sessions.push(CatalogEntry { id, path }),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                outcome.skipped.push(SkippedEntry {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    outcome
        .sessions
        .sort_by(|a, b| (a.id.start, &a.id.label).cmp(&(b.id.start, &b.id.label)));
    Ok(outcome)
}

/// Errors raised during session discovery.
#[derive(Debug)]
pub enum CatalogError {
    /// Filename does not match `<label>_<dd>_<mm>_<yyyy>_<HH>_<MM>`.
    MalformedIdentifier(PathBuf),
    /// The scan directory could not be read.
    Io(PathBuf, String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::MalformedIdentifier(path) => {
                write!(
                    f,
                    "Malformed session identifier in {:?} (expected label_dd_mm_yyyy_HH_MM)",
                    path
                )
            }
            CatalogError::Io(path, e) => write!(f, "Cannot read {:?}: {e}", path),
        }
    }
}

impl std::error::Error for CatalogError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vns-sessions-catalog-{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create test dir");
        dir
    }

    #[test]
    fn test_parse_session_id() {
        let id = SessionId::parse(Path::new("data/BFnovelinac_01_02_2019_15_03.mat")).unwrap();
        assert_eq!(id.label(), "BFnovelinac");
        assert_eq!(
            id.start().date(),
            NaiveDate::from_ymd_opt(2019, 2, 1).unwrap()
        );
        assert_eq!(id.start().hour(), 15);
        assert_eq!(id.start().minute(), 3);
        assert_eq!(id.dir_name(), "BFnovelinac_01_02_2019_15_03");
    }

    #[test]
    fn test_parse_rejects_bad_timestamp() {
        let err = SessionId::parse(Path::new("exp_99_99_9999_99_99.mat")).unwrap_err();
        assert!(matches!(err, CatalogError::MalformedIdentifier(_)));
    }

    #[test]
    fn test_parse_rejects_missing_timestamp() {
        assert!(SessionId::parse(Path::new("justalabel.mat")).is_err());
        assert!(SessionId::parse(Path::new("_01_02_2019_15_03.mat")).is_err());
    }

    #[test]
    fn test_scan_skips_malformed_and_reports() {
        let dir = test_dir("skip");
        std::fs::write(dir.join("exp_01_02_2019_15_03.mat"), b"").unwrap();
        std::fs::write(dir.join("exp_99_99_9999_99_99.mat"), b"").unwrap();

        let outcome = scan(&dir).unwrap();
        assert_eq!(outcome.sessions.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.sessions[0].id.display_start(), "2019-02-01 15:03");
    }

    #[test]
    fn test_scan_ignores_other_extensions() {
        let dir = test_dir("ext");
        std::fs::write(dir.join("exp_01_02_2019_15_03.mat"), b"").unwrap();
        std::fs::write(dir.join("notes.txt"), b"").unwrap();

        let outcome = scan(&dir).unwrap();
        assert_eq!(outcome.sessions.len(), 1);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_scan_sorts_by_start_time() {
        let dir = test_dir("sort");
        std::fs::write(dir.join("exp_05_03_2019_09_00.mat"), b"").unwrap();
        std::fs::write(dir.join("exp_01_02_2019_15_03.mat"), b"").unwrap();
        std::fs::write(dir.join("exp_20_02_2019_11_30.mat"), b"").unwrap();

        let outcome = scan(&dir).unwrap();
        let starts: Vec<String> = outcome
            .sessions
            .iter()
            .map(|s| s.id.display_start())
            .collect();
        assert_eq!(
            starts,
            vec!["2019-02-01 15:03", "2019-02-20 11:30", "2019-03-05 09:00"]
        );
    }
}
