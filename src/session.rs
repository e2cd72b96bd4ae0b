//! Session lifecycle: conversion of raw recordings into the store and
//! experiment-wide batch operations.
//!
//! A session's conversion is all-or-nothing: every trial of the
//! recording must normalize before anything is written, so a stored
//! trial table is always complete and consistent. Batch conversion over
//! an experiment is the opposite: a failing session is skipped with a
//! warning and tallied, never fatal for the batch.

use crate::catalog::{self, CatalogEntry, CatalogError, ScanOutcome, SessionId};
use crate::core::aggregate::{success_rate, SessionGroups};
use crate::core::normalize::{self, NormalizeError};
use crate::core::schema::TrialSchema;
use crate::raw::{MatLoader, RawError, RawRecording};
use crate::store::{SessionStore, StoreError};
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// One discovered recording run.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub source_path: PathBuf,
}

impl Session {
    pub fn new(id: SessionId, source_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            source_path: source_path.into(),
        }
    }

    pub fn from_entry(entry: CatalogEntry) -> Self {
        Self::new(entry.id, entry.path)
    }

    /// Decode this session's raw file and persist its tables.
    ///
    /// Returns the number of trials written.
    pub fn convert(
        &self,
        schema: &TrialSchema,
        store: &SessionStore,
    ) -> Result<usize, PipelineError> {
        let raw = MatLoader::load(&self.source_path)?;
        self.convert_recording(&raw, schema, store)
    }

    /// Normalize and persist an already-decoded recording.
    pub fn convert_recording(
        &self,
        raw: &RawRecording,
        schema: &TrialSchema,
        store: &SessionStore,
    ) -> Result<usize, PipelineError> {
        let mut trials = normalize::trial_table(raw, schema)?;

        // Normalize every trial's samples before the first write so a
        // bad trial leaves no partial session behind.
        let mut sample_tables = Vec::with_capacity(raw.samples().len());
        for matrix in raw.samples() {
            sample_tables.push(normalize::sample_table(matrix)?);
        }

        store.write_trials(&self.id, &mut trials)?;
        for (index, mut table) in sample_tables.into_iter().enumerate() {
            store.write_samples(&self.id, index as u32 + 1, &mut table)?;
        }

        Ok(trials.height())
    }

    /// Total bytes this session occupies in the store.
    pub fn disk_usage(&self, store: &SessionStore) -> u64 {
        dir_size(&store.session_dir(&self.id))
    }
}

fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

/// All sessions of one experiment, as discovered on disk.
#[derive(Debug, Default)]
pub struct Experiment {
    sessions: Vec<Session>,
    scan_skipped: usize,
}

impl Experiment {
    /// Scan a directory of raw recordings.
    pub fn scan(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Ok(Self::from_scan(catalog::scan(dir)?))
    }

    pub fn from_scan(outcome: ScanOutcome) -> Self {
        Self {
            sessions: outcome
                .sessions
                .into_iter()
                .map(Session::from_entry)
                .collect(),
            scan_skipped: outcome.skipped.len(),
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Convert every discovered session into the store.
    ///
    /// Corrupt files and schema mismatches skip the affected session.
    pub fn convert_all(&self, schema: &TrialSchema, store: &SessionStore) -> ConvertReport {
        let mut report = ConvertReport {
            scan_skipped: self.scan_skipped,
            ..ConvertReport::default()
        };

        for session in &self.sessions {
            match session.convert(schema, store) {
                Ok(trials) => {
                    tracing::info!("Converted {} ({} trials)", session.id, trials);
                    report.converted += 1;
                    report.trials += trials;
                }
                Err(e) => {
                    tracing::warn!("Skipping session {}: {}", session.id, e);
                    report.failures.push(SessionFailure {
                        id: session.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        report
    }
}

/// Cross-session summary table over everything the store holds.
///
/// One row per stored session: name, start time, trial count, success
/// rate, treatment group and disk usage.
pub fn session_summary(
    store: &SessionStore,
    groups: &SessionGroups,
) -> Result<DataFrame, PipelineError> {
    let ids = store.list_sessions()?;

    let mut names = Vec::with_capacity(ids.len());
    let mut starts = Vec::with_capacity(ids.len());
    let mut trial_counts = Vec::with_capacity(ids.len());
    let mut rates = Vec::with_capacity(ids.len());
    let mut group_labels = Vec::with_capacity(ids.len());
    let mut sizes = Vec::with_capacity(ids.len());

    for id in ids {
        let trials = store.read_trials(&id)?;
        names.push(id.dir_name());
        starts.push(id.display_start());
        trial_counts.push(trials.height() as i64);
        rates.push(success_rate(&trials).map_err(|e| StoreError::Parquet(e.to_string()))?);
        group_labels.push(groups.group_for(&id.dir_name()).to_string());
        sizes.push(dir_size(&store.session_dir(&id)) as i64);
    }

    DataFrame::new(vec![
        Series::new("session", names),
        Series::new("start", starts),
        Series::new("trials", trial_counts),
        Series::new("success_rate", rates),
        Series::new("group", group_labels),
        Series::new("bytes", sizes),
    ])
    .map_err(|e| PipelineError::Store(StoreError::Parquet(e.to_string())))
}

/// One session skipped during batch conversion.
#[derive(Debug)]
pub struct SessionFailure {
    pub id: SessionId,
    pub reason: String,
}

/// Outcome of a batch conversion.
#[derive(Debug, Default)]
pub struct ConvertReport {
    /// Sessions fully converted.
    pub converted: usize,
    /// Total trials written across converted sessions.
    pub trials: usize,
    /// Filenames skipped already at scan time.
    pub scan_skipped: usize,
    /// Sessions that failed to convert.
    pub failures: Vec<SessionFailure>,
}

impl ConvertReport {
    /// Multi-line summary for display.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Conversion finished:\n\
             - Sessions converted: {}\n\
             - Trials written: {}\n\
             - Filenames skipped at scan: {}\n\
             - Sessions failed: {}",
            self.converted,
            self.trials,
            self.scan_skipped,
            self.failures.len()
        );
        for failure in &self.failures {
            out.push_str(&format!("\n    {}: {}", failure.id, failure.reason));
        }
        out
    }
}

/// Umbrella error for the conversion pipeline.
#[derive(Debug)]
pub enum PipelineError {
    Catalog(CatalogError),
    Raw(RawError),
    Normalize(NormalizeError),
    Store(StoreError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Catalog(e) => write!(f, "{e}"),
            PipelineError::Raw(e) => write!(f, "{e}"),
            PipelineError::Normalize(e) => write!(f, "{e}"),
            PipelineError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<CatalogError> for PipelineError {
    fn from(e: CatalogError) -> Self {
        PipelineError::Catalog(e)
    }
}

impl From<RawError> for PipelineError {
    fn from(e: RawError) -> Self {
        PipelineError::Raw(e)
    }
}

impl From<NormalizeError> for PipelineError {
    fn from(e: NormalizeError) -> Self {
        PipelineError::Normalize(e)
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        PipelineError::Store(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{SampleMatrix, SAMPLE_ROWS};
    use std::collections::HashMap;

    fn test_store(name: &str) -> SessionStore {
        let root = std::env::temp_dir().join(format!("vns-sessions-session-{name}"));
        let _ = std::fs::remove_dir_all(&root);
        SessionStore::new(root)
    }

    fn session() -> Session {
        let id = SessionId::parse(Path::new("exp_01_02_2019_15_03.mat")).unwrap();
        Session::new(id, "exp_01_02_2019_15_03.mat")
    }

    fn recording(n: usize) -> RawRecording {
        let mut raw = RawRecording::new();
        raw.insert_scalar("trialnumber", (1..=n).map(|v| v as f64).collect());
        raw.insert_scalar("fractals", vec![8001.0; n]);
        raw.insert_scalar("targAngle", vec![45.0; n]);
        raw.insert_scalar("targAmp", vec![5.0; n]);
        raw.insert_scalar("goodtrial", vec![1.0; n]);
        raw.insert_scalar("fixreq", vec![1.0; n]);
        raw.insert_scalar("datapixxtime", vec![100.5; n]);
        raw.insert_scalar("trialstarttime", vec![0.2; n]);
        raw.insert_scalar("timefpon", vec![0.75; n]);
        raw.insert_scalar("timefpoff", vec![2.0; n]);
        raw.insert_scalar("windowchosen", vec![0.0; n]);
        raw.insert_scalar("timetargetoff", vec![2.5; n]);
        raw.insert_scalar("feedid", vec![3.0; n]);
        raw.insert_scalar("TrialTypeSave", vec![8001.0; n]);
        raw.insert_scalar("timefpabort", vec![0.0; n]);
        raw.insert_scalar("repeatflag", vec![0.0; n]);
        raw.insert_scalar("monkeynotinitiated", vec![0.0; n]);
        for trial in 0..n {
            let mut data = Vec::new();
            for s in 0..4 {
                data.extend_from_slice(&[trial as f64, 0.0, 0.0, 0.0, s as f64 / 10.0]);
            }
            raw.push_samples(SampleMatrix::from_column_major(SAMPLE_ROWS, data).unwrap());
        }
        raw
    }

    #[test]
    fn test_convert_recording_writes_trials_and_samples() {
        let store = test_store("convert");
        let session = session();
        let trials = session
            .convert_recording(&recording(3), &TrialSchema::v1(), &store)
            .unwrap();
        assert_eq!(trials, 3);

        let table = store.read_trials(&session.id).unwrap();
        assert_eq!(table.height(), 3);
        let samples = store.read_samples(&session.id, 2).unwrap();
        assert_eq!(samples.height(), 4);

        assert!(session.disk_usage(&store) > 0);
    }

    #[test]
    fn test_convert_recording_is_all_or_nothing() {
        let store = test_store("abort");
        let session = session();
        let mut raw = recording(2);
        // A malformed cursor matrix for the second trial.
        raw.push_samples(SampleMatrix::from_column_major(3, vec![0.0; 9]).unwrap());

        let err = session
            .convert_recording(&raw, &TrialSchema::v1(), &store)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Normalize(_)));
        // Nothing was written.
        assert!(store.read_trials(&session.id).is_err());
    }

    #[test]
    fn test_convert_all_skips_unreadable_sessions() {
        let store = test_store("batch");
        let id = SessionId::parse(Path::new("exp_01_02_2019_15_03.mat")).unwrap();
        let experiment = Experiment {
            sessions: vec![Session::new(id, "/definitely/not/here.mat")],
            scan_skipped: 1,
        };

        let report = experiment.convert_all(&TrialSchema::v1(), &store);
        assert_eq!(report.converted, 0);
        assert_eq!(report.scan_skipped, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.summary().contains("Sessions failed: 1"));
    }

    #[test]
    fn test_session_summary_includes_groups() {
        let store = test_store("summary");
        let session = session();
        session
            .convert_recording(&recording(4), &TrialSchema::v1(), &store)
            .unwrap();

        let mut by_group = HashMap::new();
        by_group.insert(
            "vns".to_string(),
            vec!["exp_01_02_2019_15_03".to_string()],
        );
        let summary = session_summary(&store, &SessionGroups::from_groups(by_group)).unwrap();

        assert_eq!(summary.height(), 1);
        let group = summary.column("group").unwrap().str().unwrap();
        assert_eq!(group.get(0), Some("vns"));
        let trials = summary.column("trials").unwrap().i64().unwrap();
        assert_eq!(trials.get(0), Some(4));
        let rate = summary.column("success_rate").unwrap().f64().unwrap();
        assert_eq!(rate.get(0), Some(1.0));
    }
}
