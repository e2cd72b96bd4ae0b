//! Raw recording decoding.
//!
//! A raw recording is a proprietary MAT container produced by the
//! acquisition rig. The container format itself is handled by the
//! external `matfile` decoder; this module owns the shape contract the
//! rest of the pipeline relies on (parallel per-trial scalar arrays plus
//! per-trial cursor sample matrices) and validates it once at the
//! decoding boundary.

pub mod mat;
pub mod types;

// Re-export commonly used types
pub use mat::MatLoader;
pub use types::{RawError, RawRecording, SampleMatrix, SAMPLE_ROWS};
