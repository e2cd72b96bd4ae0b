//! Core functionality for the VNS session pipeline.
//!
//! This module contains:
//! - The versioned trial schema injected into normalization
//! - Unit-tagged trial timestamps and the fixation window
//! - Normalization of raw recordings into tabular form
//! - Session-level aggregation over normalized tables

pub mod aggregate;
pub mod normalize;
pub mod schema;
pub mod units;

// Re-export commonly used types
pub use aggregate::{
    rolling_success_rate, success_rate, LatencyRecord, LatencySummary, SessionGroups,
    TrialTypeLabels,
};
pub use normalize::{sample_table, trial_table, trim_trailing_zeros, NormalizeError};
pub use schema::{FieldKind, FieldSpec, TrialSchema};
pub use units::{FixationWindow, Millis, Seconds};
