//! In-memory shape contract for decoded recordings.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Rows of a raw cursor sample matrix: `(x, y, distance, flag, t)`.
pub const SAMPLE_ROWS: usize = 5;

/// One trial's raw cursor samples.
///
/// The acquisition rig stores each trial's eye/cursor trace as a
/// `5 x n` matrix in column-major order, one column per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMatrix {
    rows: usize,
    data: Vec<f64>,
}

impl SampleMatrix {
    /// Build a sample matrix from column-major data.
    ///
    /// Returns `None` when the value count is not a multiple of `rows`.
    pub fn from_column_major(rows: usize, data: Vec<f64>) -> Option<Self> {
        if rows == 0 || data.len() % rows != 0 {
            return None;
        }
        Some(Self { rows, data })
    }

    /// Number of rows (channels) per sample.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of samples (columns).
    pub fn n_samples(&self) -> usize {
        self.data.len() / self.rows
    }

    /// Value at `(row, sample)`.
    pub fn value(&self, row: usize, sample: usize) -> f64 {
        self.data[sample * self.rows + row]
    }

    /// Copy one row across all samples.
    pub fn row(&self, row: usize) -> Vec<f64> {
        (0..self.n_samples()).map(|s| self.value(row, s)).collect()
    }
}

/// A decoded raw recording: named parallel scalar arrays (implicitly
/// indexed by trial) plus per-trial cursor sample matrices.
///
/// This is the boundary type between the external decoder and the
/// normalizer; field presence and lengths are checked against the trial
/// schema during normalization, not here.
#[derive(Debug, Clone, Default)]
pub struct RawRecording {
    scalars: BTreeMap<String, Vec<f64>>,
    samples: Vec<SampleMatrix>,
}

impl RawRecording {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a per-trial scalar field.
    pub fn insert_scalar(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.scalars.insert(name.into(), values);
    }

    /// Append one trial's sample matrix. Matrices are ordered by trial.
    pub fn push_samples(&mut self, matrix: SampleMatrix) {
        self.samples.push(matrix);
    }

    /// Look up a scalar field by name.
    pub fn scalar(&self, name: &str) -> Option<&[f64]> {
        self.scalars.get(name).map(|v| v.as_slice())
    }

    /// Names of all scalar fields present.
    pub fn scalar_names(&self) -> impl Iterator<Item = &str> {
        self.scalars.keys().map(|k| k.as_str())
    }

    /// Per-trial sample matrices, ordered by trial number.
    pub fn samples(&self) -> &[SampleMatrix] {
        &self.samples
    }

    /// Trial count: the length of `trialnumber` when present, otherwise
    /// the length of the first scalar field.
    pub fn trial_count(&self) -> usize {
        self.scalar("trialnumber")
            .map(|v| v.len())
            .or_else(|| self.scalars.values().next().map(|v| v.len()))
            .unwrap_or(0)
    }
}

/// Errors raised while decoding a raw recording.
#[derive(Debug)]
pub enum RawError {
    /// The file could not be opened.
    Io(PathBuf, String),
    /// The container is missing its expected structure.
    CorruptFile { path: PathBuf, reason: String },
}

impl std::fmt::Display for RawError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawError::Io(path, e) => write!(f, "Cannot open {:?}: {e}", path),
            RawError::CorruptFile { path, reason } => {
                write!(f, "Corrupt recording {:?}: {reason}", path)
            }
        }
    }
}

impl std::error::Error for RawError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_matrix_layout() {
        // Two samples: (1,2,3,4,5) and (6,7,8,9,10).
        let m = SampleMatrix::from_column_major(
            SAMPLE_ROWS,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
        )
        .unwrap();
        assert_eq!(m.n_samples(), 2);
        assert_eq!(m.value(0, 0), 1.0);
        assert_eq!(m.value(4, 0), 5.0);
        assert_eq!(m.value(0, 1), 6.0);
        assert_eq!(m.row(4), vec![5.0, 10.0]);
    }

    #[test]
    fn test_sample_matrix_rejects_ragged_data() {
        assert!(SampleMatrix::from_column_major(SAMPLE_ROWS, vec![1.0; 7]).is_none());
        assert!(SampleMatrix::from_column_major(0, vec![]).is_none());
    }

    #[test]
    fn test_trial_count_prefers_trialnumber() {
        let mut raw = RawRecording::new();
        raw.insert_scalar("goodtrial", vec![1.0; 7]);
        assert_eq!(raw.trial_count(), 7);

        raw.insert_scalar("trialnumber", vec![1.0, 2.0, 3.0]);
        assert_eq!(raw.trial_count(), 3);
    }
}
