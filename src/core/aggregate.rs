//! Session-level aggregation over normalized tables.
//!
//! Everything here is read-only: derived views are computed from the
//! per-trial table (and the external lookup documents) without touching
//! stored data.

use crate::core::units::{Millis, Seconds};
use polars::prelude::*;
use serde::Deserialize;
use statrs::statistics::{Data, Distribution, Median, OrderStatistics};
use std::collections::HashMap;
use std::path::Path;

/// Group label for sessions not covered by the lookup document.
pub const UNGROUPED: &str = "neither";

/// Rolling mean of `goodtrial` over a trailing window.
///
/// The window covers the current trial and the `window - 1` before it;
/// the first `window - 1` trials have no full window and yield `None`.
/// The table must already be sorted by `trialnumber` (catalog and store
/// both produce sorted tables; this is not re-checked here).
pub fn rolling_success_rate(
    trials: &DataFrame,
    window: usize,
) -> Result<Vec<Option<f64>>, PolarsError> {
    let window = window.max(1);
    let good = trials.column("goodtrial")?.bool()?;
    let outcomes: Vec<bool> = good.into_iter().map(|v| v.unwrap_or(false)).collect();

    let mut rates = Vec::with_capacity(outcomes.len());
    let mut in_window = 0usize;
    for (index, &outcome) in outcomes.iter().enumerate() {
        if outcome {
            in_window += 1;
        }
        if index >= window {
            // The trial sliding out of the window.
            if outcomes[index - window] {
                in_window -= 1;
            }
        }
        if index + 1 >= window {
            rates.push(Some(in_window as f64 / window as f64));
        } else {
            rates.push(None);
        }
    }
    Ok(rates)
}

/// Whole-session success rate.
pub fn success_rate(trials: &DataFrame) -> Result<f64, PolarsError> {
    let good = trials.column("goodtrial")?.bool()?;
    if good.is_empty() {
        return Ok(0.0);
    }
    let successes = good.into_iter().filter(|v| v.unwrap_or(false)).count();
    Ok(successes as f64 / good.len() as f64)
}

/// External lookup mapping numeric trial-type codes to display labels.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrialTypeLabels {
    #[serde(flatten)]
    labels: HashMap<String, String>,
}

impl TrialTypeLabels {
    /// Load the code table from a JSON document (`{"8001": "Visually guided", ...}`).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| LookupError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| LookupError::Parse(e.to_string()))
    }

    pub fn from_map(labels: HashMap<String, String>) -> Self {
        Self { labels }
    }

    /// Display label for a code; unmapped codes keep their code string.
    pub fn label_for(&self, code: &str) -> String {
        self.labels
            .get(code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }
}

/// External lookup assigning sessions to treatment groups.
///
/// The source document maps group label to session names
/// (`{"vns": ["exp_01_02_2019_15_03", ...], "sham": [...]}`); the
/// lookup is inverted at load time. Sessions absent from the document
/// fall back to [`UNGROUPED`] rather than failing.
#[derive(Debug, Clone, Default)]
pub struct SessionGroups {
    by_session: HashMap<String, String>,
}

impl SessionGroups {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| LookupError::Io(e.to_string()))?;
        let groups: HashMap<String, Vec<String>> =
            serde_json::from_str(&content).map_err(|e| LookupError::Parse(e.to_string()))?;
        Ok(Self::from_groups(groups))
    }

    pub fn from_groups(groups: HashMap<String, Vec<String>>) -> Self {
        let mut by_session = HashMap::new();
        for (group, sessions) in groups {
            for session in sessions {
                by_session.insert(session, group.clone());
            }
        }
        Self { by_session }
    }

    pub fn group_for(&self, session: &str) -> &str {
        self.by_session
            .get(session)
            .map(|g| g.as_str())
            .unwrap_or(UNGROUPED)
    }
}

/// One `(outcome latency, trial type)` observation.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyRecord {
    /// Time from target offset to the recorded outcome.
    pub latency: Millis,
    /// Display label of the trial type.
    pub trial_type: String,
}

/// Collect latency observations from a per-trial table.
///
/// Trials without a recorded outcome event are skipped. Sessions
/// recorded before the outcome event existed have no `timeoutcome`
/// column at all and contribute nothing.
pub fn latency_records(
    trials: &DataFrame,
    labels: &TrialTypeLabels,
) -> Result<Vec<LatencyRecord>, PolarsError> {
    if !trials.get_column_names().contains(&"timeoutcome") {
        return Ok(Vec::new());
    }

    let outcome = trials.column("timeoutcome")?.f64()?;
    let target_off = trials.column("timetargetoff")?.f64()?;
    let trial_type = trials.column("TrialTypeSave")?.str()?;

    let mut records = Vec::new();
    for index in 0..trials.height() {
        let outcome_at = Seconds(outcome.get(index).unwrap_or(0.0));
        if !outcome_at.is_set() {
            continue;
        }
        let target_off_at = Seconds(target_off.get(index).unwrap_or(0.0));
        let code = trial_type.get(index).unwrap_or_default();
        records.push(LatencyRecord {
            latency: Seconds(outcome_at.value() - target_off_at.value()).to_millis(),
            trial_type: labels.label_for(code),
        });
    }
    Ok(records)
}

/// Distribution summary of a set of latency observations.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    pub count: usize,
    pub mean: Millis,
    pub median: Millis,
    pub p90: Millis,
}

/// Summarize latency observations; `None` when there are none.
pub fn latency_summary(records: &[LatencyRecord]) -> Option<LatencySummary> {
    if records.is_empty() {
        return None;
    }
    let values: Vec<f64> = records.iter().map(|r| r.latency.value()).collect();
    let mut data = Data::new(values);
    Some(LatencySummary {
        count: records.len(),
        mean: Millis(data.mean().unwrap_or(0.0)),
        median: Millis(data.median()),
        p90: Millis(data.percentile(90)),
    })
}

/// Empirical CDF points `(value, cumulative fraction)` for plotting.
pub fn ecdf(values: &[f64]) -> Vec<(f64, f64)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len() as f64;
    sorted
        .into_iter()
        .enumerate()
        .map(|(index, value)| (value, (index + 1) as f64 / n))
        .collect()
}

/// Errors loading an external lookup document.
#[derive(Debug)]
pub enum LookupError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupError::Io(e) => write!(f, "IO error: {e}"),
            LookupError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for LookupError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn trials_with_goodtrial(outcomes: &[bool]) -> DataFrame {
        let numbers: Vec<i64> = (1..=outcomes.len() as i64).collect();
        DataFrame::new(vec![
            Series::new("trialnumber", numbers),
            Series::new("goodtrial", outcomes.to_vec()),
        ])
        .unwrap()
    }

    #[test]
    fn test_rolling_success_rate_window_5() {
        let outcomes = [
            true, false, true, true, false, true, true, true, false, true,
        ];
        let trials = trials_with_goodtrial(&outcomes);
        let rates = rolling_success_rate(&trials, 5).unwrap();

        // No full window before the fifth trial.
        assert_eq!(rates[3], None);
        // Trials 1-5: three successes.
        assert_eq!(rates[4], Some(0.6));
        // Trials 2-6: three successes.
        assert_eq!(rates[5], Some(0.6));
        assert_eq!(rates[9], Some(0.8));
        assert_eq!(rates.len(), outcomes.len());
    }

    #[test]
    fn test_rolling_success_rate_window_1() {
        let trials = trials_with_goodtrial(&[true, false, true]);
        let rates = rolling_success_rate(&trials, 1).unwrap();
        assert_eq!(rates, vec![Some(1.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_success_rate() {
        let trials = trials_with_goodtrial(&[true, false, true, true]);
        assert_eq!(success_rate(&trials).unwrap(), 0.75);

        let empty = trials_with_goodtrial(&[]);
        assert_eq!(success_rate(&empty).unwrap(), 0.0);
    }

    #[test]
    fn test_session_groups_default_to_neither() {
        let mut groups = HashMap::new();
        groups.insert("vns".to_string(), vec!["exp_01_02_2019_15_03".to_string()]);
        let lookup = SessionGroups::from_groups(groups);

        assert_eq!(lookup.group_for("exp_01_02_2019_15_03"), "vns");
        assert_eq!(lookup.group_for("exp_20_02_2019_11_30"), UNGROUPED);
    }

    #[test]
    fn test_trial_type_labels_keep_unmapped_codes() {
        let mut labels = HashMap::new();
        labels.insert("8001".to_string(), "Visually guided".to_string());
        let lookup = TrialTypeLabels::from_map(labels);

        assert_eq!(lookup.label_for("8001"), "Visually guided");
        assert_eq!(lookup.label_for("9999"), "9999");
    }

    fn trials_with_latency() -> DataFrame {
        DataFrame::new(vec![
            Series::new("trialnumber", vec![1i64, 2, 3]),
            Series::new("timetargetoff", vec![2.5, 2.5, 2.5]),
            Series::new("timeoutcome", vec![2.8, 0.0, 3.0]),
            Series::new(
                "TrialTypeSave",
                vec!["8001".to_string(), "8001".to_string(), "9002".to_string()],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_latency_records_skip_unset_outcomes() {
        let records = latency_records(&trials_with_latency(), &TrialTypeLabels::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert!((records[0].latency.value() - 300.0).abs() < 1e-9);
        assert_eq!(records[1].trial_type, "9002");
    }

    #[test]
    fn test_latency_records_without_outcome_column() {
        let trials = trials_with_goodtrial(&[true]);
        let records = latency_records(&trials, &TrialTypeLabels::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_latency_summary() {
        let records: Vec<LatencyRecord> = [100.0, 200.0, 300.0]
            .iter()
            .map(|&v| LatencyRecord {
                latency: Millis(v),
                trial_type: "t".to_string(),
            })
            .collect();

        let summary = latency_summary(&records).unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.mean, Millis(200.0));
        assert_eq!(summary.median, Millis(200.0));

        assert!(latency_summary(&[]).is_none());
    }

    #[test]
    fn test_ecdf_reaches_one() {
        let points = ecdf(&[300.0, 100.0, 200.0]);
        assert_eq!(points[0], (100.0, 1.0 / 3.0));
        assert_eq!(points[2], (300.0, 1.0));
    }
}
