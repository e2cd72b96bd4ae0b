//! Columnar persistence for normalized tables.
//!
//! Each session owns one directory under the store root, named by its
//! parsed identity (`label_dd_mm_yyyy_HH_MM`), holding the per-trial
//! table (`trials.parquet`) and one `<trial>.parquet` per trial for the
//! cursor samples. Cross-session derived artifacts live at the root.
//! All tables are written as gzip-compressed parquet.
//!
//! Writes are whole-file replaces; a key is never appended to, so a
//! failed write cannot leave a partially updated table behind.
//! Concurrent writers to the same key are not coordinated; callers
//! serialize writes per key.

use crate::catalog::SessionId;
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// Filename of the per-trial table within a session directory.
const TRIALS_FILE: &str = "trials.parquet";

/// Filename of the pre-joined latency artifact at the store root.
const LATENCY_FILE: &str = "trials+latency.parquet";

/// Filename of the cross-session summary artifact at the store root.
const SUMMARY_FILE: &str = "sessions.parquet";

/// On-disk store of normalized session tables.
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one session's tables.
    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.root.join(id.dir_name())
    }

    fn trials_path(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join(TRIALS_FILE)
    }

    fn samples_path(&self, id: &SessionId, trial: u32) -> PathBuf {
        self.session_dir(id).join(format!("{trial}.parquet"))
    }

    /// Write a session's per-trial table, replacing any prior content.
    pub fn write_trials(&self, id: &SessionId, trials: &mut DataFrame) -> Result<(), StoreError> {
        write_parquet(&self.trials_path(id), trials)
    }

    /// Read a session's per-trial table.
    pub fn read_trials(&self, id: &SessionId) -> Result<DataFrame, StoreError> {
        read_parquet(&self.trials_path(id))
    }

    /// Write one trial's cursor sample table.
    pub fn write_samples(
        &self,
        id: &SessionId,
        trial: u32,
        samples: &mut DataFrame,
    ) -> Result<(), StoreError> {
        write_parquet(&self.samples_path(id, trial), samples)
    }

    /// Read one trial's cursor sample table.
    pub fn read_samples(&self, id: &SessionId, trial: u32) -> Result<DataFrame, StoreError> {
        read_parquet(&self.samples_path(id, trial))
    }

    /// Read every `step`-th cursor sample of one trial, for display.
    pub fn read_samples_downsampled(
        &self,
        id: &SessionId,
        trial: u32,
        step: usize,
    ) -> Result<DataFrame, StoreError> {
        let samples = self.read_samples(id, trial)?;
        let step = step.max(1);
        let indices: Vec<IdxSize> = (0..samples.height())
            .step_by(step)
            .map(|i| i as IdxSize)
            .collect();
        samples
            .take(&IdxCa::from_vec("idx", indices))
            .map_err(|e| StoreError::Parquet(e.to_string()))
    }

    /// Append a column to a stored per-trial table and rewrite it.
    ///
    /// The column must have exactly one value per stored row, in the
    /// stored row order.
    pub fn add_column(&self, id: &SessionId, column: Series) -> Result<DataFrame, StoreError> {
        let trials = self.read_trials(id)?;
        if column.len() != trials.height() {
            return Err(StoreError::ShapeMismatch {
                expected: trials.height(),
                found: column.len(),
            });
        }
        let mut updated = trials
            .hstack(&[column])
            .map_err(|e| StoreError::Parquet(e.to_string()))?;
        self.write_trials(id, &mut updated)?;
        Ok(updated)
    }

    /// Drop a column from a stored per-trial table and rewrite it.
    ///
    /// Dropping a column that is not present is a no-op, not an error.
    pub fn drop_column(&self, id: &SessionId, name: &str) -> Result<DataFrame, StoreError> {
        let trials = self.read_trials(id)?;
        if !trials.get_column_names().contains(&name) {
            return Ok(trials);
        }
        let mut updated = trials
            .drop(name)
            .map_err(|e| StoreError::Parquet(e.to_string()))?;
        self.write_trials(id, &mut updated)?;
        Ok(updated)
    }

    /// Sessions with a stored per-trial table, sorted by start time.
    pub fn list_sessions(&self) -> Result<Vec<SessionId>, StoreError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };

        let mut sessions = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_dir() || !path.join(TRIALS_FILE).exists() {
                continue;
            }
            if let Ok(id) = SessionId::parse(&path) {
                sessions.push(id);
            }
        }
        sessions.sort_by_key(|id| (id.start(), id.label().to_string()));
        Ok(sessions)
    }

    /// Write the pre-joined latency artifact consumed by dashboards.
    pub fn write_latency_table(&self, table: &mut DataFrame) -> Result<(), StoreError> {
        write_parquet(&self.root.join(LATENCY_FILE), table)
    }

    pub fn read_latency_table(&self) -> Result<DataFrame, StoreError> {
        read_parquet(&self.root.join(LATENCY_FILE))
    }

    /// Write the cross-session summary artifact.
    pub fn write_session_summary(&self, table: &mut DataFrame) -> Result<(), StoreError> {
        write_parquet(&self.root.join(SUMMARY_FILE), table)
    }

    pub fn read_session_summary(&self) -> Result<DataFrame, StoreError> {
        read_parquet(&self.root.join(SUMMARY_FILE))
    }
}

fn write_parquet(path: &Path, table: &mut DataFrame) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
    }
    let file = std::fs::File::create(path).map_err(|e| StoreError::Io(e.to_string()))?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Gzip(None))
        .finish(table)
        .map_err(|e| StoreError::Parquet(e.to_string()))?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<DataFrame, StoreError> {
    let file = std::fs::File::open(path).map_err(|e| StoreError::Io(e.to_string()))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::Parquet(e.to_string()))
}

/// Errors raised by the store.
#[derive(Debug)]
pub enum StoreError {
    Io(String),
    Parquet(String),
    /// An appended column's row count differs from the stored table's.
    ShapeMismatch { expected: usize, found: usize },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {e}"),
            StoreError::Parquet(e) => write!(f, "Parquet error: {e}"),
            StoreError::ShapeMismatch { expected, found } => {
                write!(f, "Shape mismatch: table has {expected} rows, column has {found}")
            }
        }
    }
}

impl std::error::Error for StoreError {}
