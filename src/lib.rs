//! VNS Sessions - session/trial pipeline for behavioral recordings.
//!
//! This library loads raw vagus-nerve-stimulation recording files
//! (eye/cursor trajectories captured over a trial paradigm), normalizes
//! the nested per-trial structure into tabular form, persists the tables
//! as gzip-compressed parquet and computes session-level aggregates.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        VNS Sessions                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌────────────┐   ┌───────────┐   ┌───────┐  │
//! │  │ Catalog  │──▶│ RawLoader  │──▶│ Normalize │──▶│ Store │  │
//! │  │ (scan)   │   │ (.mat)     │   │ (tables)  │   │ (.pq) │  │
//! │  └──────────┘   └────────────┘   └───────────┘   └───┬───┘  │
//! │                                                      │      │
//! │                                  ┌───────────┐       ▼      │
//! │                                  │ Presenter │◀── Aggregate │
//! │                                  │ (plots)   │              │
//! │                                  └───────────┘              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use vns_sessions::{catalog, core::schema::TrialSchema, session::Experiment, store::SessionStore};
//!
//! let outcome = catalog::scan("data/BFINAC_VNS").expect("scan failed");
//! let store = SessionStore::new("data/BFINAC_VNS/parquet");
//! let experiment = Experiment::from_scan(outcome);
//! let report = experiment.convert_all(&TrialSchema::v1(), &store);
//! println!("{} sessions converted", report.converted);
//! ```

pub mod catalog;
pub mod config;
pub mod core;
pub mod raw;
pub mod session;
pub mod store;

#[cfg(feature = "plots")]
pub mod present;

// Re-export key types at crate root for convenience
pub use catalog::{CatalogError, ScanOutcome, SessionId};
pub use config::Config;
pub use core::aggregate::{
    rolling_success_rate, success_rate, LatencyRecord, LatencySummary, SessionGroups,
    TrialTypeLabels,
};
pub use core::normalize::{sample_table, trial_table, trim_trailing_zeros, NormalizeError};
pub use core::schema::{FieldKind, TrialSchema};
pub use core::units::{FixationWindow, Millis, Seconds};
pub use raw::{MatLoader, RawError, RawRecording, SampleMatrix};
pub use session::{ConvertReport, Experiment, PipelineError, Session};
pub use store::{SessionStore, StoreError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
