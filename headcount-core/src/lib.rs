//! Core people-counting primitives.
//!
//! This crate runs several Haar cascade face detectors over an image and fuses
//! their overlapping candidates into one rectangle per person.

/// Candidate aggregation across detector passes.
pub mod aggregate;
/// OpenCV-compatible Haar cascade loading and multi-scale detection.
pub mod cascade;
/// Detector trait and per-image detection parameters.
pub mod detector;
/// Size filtering and overlap resolution.
pub mod fusion;
/// End-to-end counting of one image.
pub mod pipeline;
/// Integer rectangle geometry.
pub mod rect;

pub use aggregate::{DetectorOutputs, Orientation, aggregate, sanitize_candidates};
pub use cascade::{CascadeError, HaarCascade};
pub use detector::{CandidateDetector, DetectionParams};
pub use fusion::{Fusion, FusionConfig, SizeBounds, collides, fuse};
pub use pipeline::{CascadeSet, CountOutput, FusionStats, PeopleCounter};
pub use rect::{FrameSize, Rect};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
