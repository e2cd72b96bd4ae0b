//! Chart rendering over computed tables.
//!
//! Thin presentation glue: everything plotted here is computed by the
//! aggregator or read from the store. Charts are written as standalone
//! HTML documents.

use crate::core::aggregate::{ecdf, LatencyRecord};
use crate::core::units::{FixationWindow, Seconds};
use plotly::common::{Marker, Mode};
use plotly::color::NamedColor;
use plotly::{Plot, Scatter};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

/// Line chart of the rolling success rate over trial number.
///
/// Trials without a full trailing window are omitted rather than drawn
/// as zero.
pub fn rolling_success_chart(rates: &[Option<f64>]) -> Plot {
    let mut trials = Vec::new();
    let mut values = Vec::new();
    for (index, rate) in rates.iter().enumerate() {
        if let Some(rate) = rate {
            trials.push(index as i64 + 1);
            values.push(*rate);
        }
    }

    let mut plot = Plot::new();
    plot.add_trace(
        Scatter::new(trials, values)
            .mode(Mode::Lines)
            .name("rolling success rate"),
    );
    plot
}

/// Empirical CDF of outcome latency, one trace per trial type.
pub fn latency_ecdf_chart(records: &[LatencyRecord]) -> Plot {
    let mut by_type: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in records {
        by_type
            .entry(record.trial_type.as_str())
            .or_default()
            .push(record.latency.value());
    }

    let mut plot = Plot::new();
    for (trial_type, latencies) in by_type {
        let points = ecdf(&latencies);
        let (xs, ys): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
        plot.add_trace(Scatter::new(xs, ys).mode(Mode::Lines).name(trial_type));
    }
    plot
}

/// Cursor trajectory of one trial, with the fixation interval marked.
///
/// The fixation start and end samples are drawn as markers: green when
/// fixation completed, red when it was aborted.
pub fn cursor_path_chart(
    samples: &DataFrame,
    fixation: Option<FixationWindow>,
) -> Result<Plot, PolarsError> {
    let x: Vec<f64> = samples.column("x")?.f64()?.into_iter().flatten().collect();
    let y: Vec<f64> = samples.column("y")?.f64()?.into_iter().flatten().collect();

    let mut plot = Plot::new();
    plot.add_trace(Scatter::new(x, y).mode(Mode::Lines).name("cursor"));

    if let Some(fixation) = fixation {
        let color = if fixation.is_completed() {
            NamedColor::Green
        } else {
            NamedColor::Red
        };
        let mut marks_x = Vec::new();
        let mut marks_y = Vec::new();
        for at in [fixation.start(), fixation.end()] {
            if let Some((mx, my)) = sample_position_at(samples, at)? {
                marks_x.push(mx);
                marks_y.push(my);
            }
        }
        if !marks_x.is_empty() {
            let name = if fixation.is_completed() {
                "fixation (completed)"
            } else {
                "fixation (aborted)"
            };
            plot.add_trace(
                Scatter::new(marks_x, marks_y)
                    .mode(Mode::Markers)
                    .marker(Marker::new().color(color).size(10))
                    .name(name),
            );
        }
    }
    Ok(plot)
}

/// Position of the first sample at or after the given trial time.
fn sample_position_at(
    samples: &DataFrame,
    at: Seconds,
) -> Result<Option<(f64, f64)>, PolarsError> {
    let t = samples.column("t")?.f64()?;
    let x = samples.column("x")?.f64()?;
    let y = samples.column("y")?.f64()?;

    for index in 0..samples.height() {
        if t.get(index).unwrap_or(0.0) >= at.value() {
            if let (Some(px), Some(py)) = (x.get(index), y.get(index)) {
                return Ok(Some((px, py)));
            }
        }
    }
    Ok(None)
}

/// Write a chart as a standalone HTML document.
pub fn write_chart(plot: &Plot, path: impl AsRef<Path>) {
    plot.write_html(path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::Millis;

    #[test]
    fn test_rolling_chart_skips_empty_window_edge() {
        let plot = rolling_success_chart(&[None, None, Some(0.5), Some(0.75)]);
        let html = plot.to_html();
        assert!(html.contains("rolling success rate"));
    }

    #[test]
    fn test_latency_ecdf_one_trace_per_type() {
        let records = vec![
            LatencyRecord {
                latency: Millis(250.0),
                trial_type: "Visually guided".to_string(),
            },
            LatencyRecord {
                latency: Millis(420.0),
                trial_type: "Memory guided".to_string(),
            },
        ];
        let html = latency_ecdf_chart(&records).to_html();
        assert!(html.contains("Visually guided"));
        assert!(html.contains("Memory guided"));
    }

    #[test]
    fn test_cursor_path_marks_fixation() {
        let samples = DataFrame::new(vec![
            Series::new("x", vec![0.0, 1.0, 2.0]),
            Series::new("y", vec![0.0, -1.0, -2.0]),
            Series::new("t", vec![0.1, 0.8, 2.1]),
        ])
        .unwrap();
        let fixation = FixationWindow::from_trial(Seconds(0.75), Seconds(2.0), Seconds(0.0));

        let html = cursor_path_chart(&samples, fixation).unwrap().to_html();
        assert!(html.contains("fixation (completed)"));
    }
}
