//! Normalization of raw recordings into tabular form.
//!
//! A raw recording flattens into two table shapes: the per-trial table
//! (one row per trial, one column per declared scalar field) and the
//! per-sample cursor table (one row per sample, columns `x`, `y`, `t`).
//! Field presence, types and lengths are checked here, once, against
//! the injected [`TrialSchema`]; downstream consumers trust the tables.

use crate::core::schema::{FieldKind, TrialSchema};
use crate::raw::{RawRecording, SampleMatrix, SAMPLE_ROWS};
use polars::prelude::*;

/// Rows of the raw sample matrix that survive normalization.
const X_ROW: usize = 0;
const Y_ROW: usize = 1;
const T_ROW: usize = 4;

/// Build the per-trial table from a decoded recording.
///
/// One row per trial, ordered by `trialnumber`. When the recording
/// carries no `trialnumber` field, trials are numbered positionally
/// from 1.
pub fn trial_table(
    raw: &RawRecording,
    schema: &TrialSchema,
) -> Result<DataFrame, NormalizeError> {
    let count = raw.trial_count();
    let trial_numbers = trial_numbers(raw, count)?;

    let mut columns = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        if field.name == "trialnumber" {
            columns.push(Series::new(&field.name, trial_numbers.clone()));
            continue;
        }

        let values = match raw.scalar(&field.name) {
            Some(values) => values,
            None if field.required => {
                return Err(NormalizeError::SchemaMismatch {
                    field: field.name.clone(),
                    reason: "required field absent from recording".to_string(),
                });
            }
            // Optional fields simply don't become columns.
            None => continue,
        };

        if values.len() != count {
            return Err(NormalizeError::SchemaMismatch {
                field: field.name.clone(),
                reason: format!("{} values for {count} trials", values.len()),
            });
        }

        columns.push(coerce(&field.name, field.kind, values));
    }

    DataFrame::new(columns).map_err(|e| NormalizeError::Frame(e.to_string()))
}

/// Resolve and validate the 1-based trial numbering.
fn trial_numbers(raw: &RawRecording, count: usize) -> Result<Vec<i64>, NormalizeError> {
    match raw.scalar("trialnumber") {
        Some(values) => {
            let numbers: Vec<i64> = values.iter().map(|&v| v.round() as i64).collect();
            for (index, &number) in numbers.iter().enumerate() {
                if number != index as i64 + 1 {
                    return Err(NormalizeError::SchemaMismatch {
                        field: "trialnumber".to_string(),
                        reason: format!("expected {} at position {index}, found {number}", index + 1),
                    });
                }
            }
            Ok(numbers)
        }
        None => Ok((1..=count as i64).collect()),
    }
}

/// Coerce one raw parallel array to its declared column type.
fn coerce(name: &str, kind: FieldKind, values: &[f64]) -> Series {
    match kind {
        FieldKind::Bool => {
            let values: Vec<bool> = values.iter().map(|&v| v != 0.0).collect();
            Series::new(name, values)
        }
        FieldKind::Int => {
            let values: Vec<i64> = values.iter().map(|&v| v.round() as i64).collect();
            Series::new(name, values)
        }
        FieldKind::Float => Series::new(name, values.to_vec()),
        FieldKind::Category => {
            let values: Vec<String> = values.iter().map(|&v| category_code(v)).collect();
            Series::new(name, values)
        }
    }
}

/// Render a categorical code the way external code tables key it:
/// integral codes without a decimal point.
fn category_code(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Build one trial's per-sample cursor table.
///
/// Transposes the raw `(x, y, distance, flag, t)` matrix into columns,
/// keeps `(x, y, t)` and trims the trailing sentinel padding.
pub fn sample_table(matrix: &SampleMatrix) -> Result<DataFrame, NormalizeError> {
    if matrix.rows() != SAMPLE_ROWS {
        return Err(NormalizeError::SchemaMismatch {
            field: "EyeJoy".to_string(),
            reason: format!("expected {SAMPLE_ROWS} rows per sample, found {}", matrix.rows()),
        });
    }

    let table = DataFrame::new(vec![
        Series::new("x", matrix.row(X_ROW)),
        Series::new("y", matrix.row(Y_ROW)),
        Series::new("t", matrix.row(T_ROW)),
    ])
    .map_err(|e| NormalizeError::Frame(e.to_string()))?;

    trim_trailing_zeros(&table)
}

/// Drop the trailing rows whose timestamp is exactly zero.
///
/// Raw capture pads each trial's sample matrix with zero-valued rows;
/// under correct capture `t` never returns to exactly zero once it has
/// deviated from it, so only the trailing run is padding. Trimming an
/// already-trimmed table is a no-op.
pub fn trim_trailing_zeros(samples: &DataFrame) -> Result<DataFrame, NormalizeError> {
    let t = samples
        .column("t")
        .and_then(|s| s.f64())
        .map_err(|e| NormalizeError::Frame(e.to_string()))?;

    let mut keep = 0;
    for (index, value) in t.into_iter().enumerate() {
        if value.unwrap_or(0.0) != 0.0 {
            keep = index + 1;
        }
    }

    Ok(samples.slice(0, keep))
}

/// Errors raised during normalization.
#[derive(Debug)]
pub enum NormalizeError {
    /// A declared field is absent or disagrees with the trial count.
    SchemaMismatch { field: String, reason: String },
    /// Table assembly failed.
    Frame(String),
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::SchemaMismatch { field, reason } => {
                write!(f, "Schema mismatch on {field:?}: {reason}")
            }
            NormalizeError::Frame(e) => write!(f, "Frame error: {e}"),
        }
    }
}

impl std::error::Error for NormalizeError {}
