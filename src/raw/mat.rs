//! MAT container adapter.
//!
//! Wraps the external `matfile` decoder and maps its output onto the
//! [`RawRecording`](crate::raw::RawRecording) shape contract. The
//! acquisition rig exports recordings in a flattened layout: a `PDS`
//! marker variable, one named 1-D numeric array per per-trial scalar
//! field, and one `EyeJoy_<trial>` matrix (5 rows, column-major) per
//! trial for the cursor trace. A file without the `PDS` marker is
//! reported as corrupt and skipped by batch conversion; there is nothing
//! to retry.

use crate::raw::types::{RawError, RawRecording, SampleMatrix, SAMPLE_ROWS};
use matfile::{MatFile, NumericData};
use std::path::Path;

/// Top-level key identifying a recording export.
pub const RECORDING_KEY: &str = "PDS";

/// Name prefix of per-trial cursor matrices.
const SAMPLES_PREFIX: &str = "EyeJoy_";

/// Decoder for raw recording files.
pub struct MatLoader;

impl MatLoader {
    /// Decode one raw recording file.
    pub fn load(path: impl AsRef<Path>) -> Result<RawRecording, RawError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| RawError::Io(path.to_path_buf(), e.to_string()))?;
        let mat = MatFile::parse(file).map_err(|e| RawError::CorruptFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if mat.find_by_name(RECORDING_KEY).is_none() {
            return Err(RawError::CorruptFile {
                path: path.to_path_buf(),
                reason: format!("missing top-level {RECORDING_KEY} key"),
            });
        }

        let mut recording = RawRecording::new();
        let mut trial_samples: Vec<(u32, SampleMatrix)> = Vec::new();

        for array in mat.arrays().iter() {
            let name = array.name();
            if name == RECORDING_KEY {
                continue;
            }

            if let Some(trial) = name.strip_prefix(SAMPLES_PREFIX) {
                let trial: u32 = trial.parse().map_err(|_| RawError::CorruptFile {
                    path: path.to_path_buf(),
                    reason: format!("unparseable trial index in {name:?}"),
                })?;
                let matrix = Self::sample_matrix(array).ok_or_else(|| RawError::CorruptFile {
                    path: path.to_path_buf(),
                    reason: format!("{name:?} is not a {SAMPLE_ROWS}-row sample matrix"),
                })?;
                trial_samples.push((trial, matrix));
                continue;
            }

            match Self::vector(array) {
                Some(values) => recording.insert_scalar(name, values),
                None => {
                    tracing::warn!("Ignoring non-vector variable {:?} in {}", name, path.display());
                }
            }
        }

        trial_samples.sort_by_key(|(trial, _)| *trial);
        for (_, matrix) in trial_samples {
            recording.push_samples(matrix);
        }

        Ok(recording)
    }

    /// Interpret an array as a 1-D scalar field.
    fn vector(array: &matfile::Array) -> Option<Vec<f64>> {
        let size = array.size();
        let is_vector = match size.len() {
            1 => true,
            2 => size[0] <= 1 || size[1] <= 1,
            _ => false,
        };
        if !is_vector {
            return None;
        }
        Some(numeric_to_f64(array.data()))
    }

    /// Interpret an array as a per-trial cursor matrix.
    fn sample_matrix(array: &matfile::Array) -> Option<SampleMatrix> {
        let size = array.size();
        if size.len() != 2 || size[0] != SAMPLE_ROWS {
            return None;
        }
        // MAT arrays are stored column-major, matching SampleMatrix.
        SampleMatrix::from_column_major(SAMPLE_ROWS, numeric_to_f64(array.data()))
    }
}

/// Widen any numeric MAT payload to f64.
fn numeric_to_f64(data: &NumericData) -> Vec<f64> {
    match data {
        NumericData::Double { real, .. } => real.clone(),
        NumericData::Single { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("vns-sessions-mat");
        std::fs::create_dir_all(&dir).expect("create test dir");
        dir
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = MatLoader::load("/definitely/not/here.mat").unwrap_err();
        assert!(matches!(err, RawError::Io(_, _)));
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let path = test_dir().join("garbage.mat");
        std::fs::write(&path, b"this is not a MAT container").unwrap();
        let err = MatLoader::load(&path).unwrap_err();
        assert!(matches!(err, RawError::CorruptFile { .. }));
    }
}
