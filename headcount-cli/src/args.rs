//! Command-line argument definitions for the `headcount` binary.

use clap::{ArgAction, Parser};
use headcount_utils::config::CollisionPolicy;
use std::path::PathBuf;

/// Count people in every image of a directory by fusing several face detectors.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct CountArgs {
    /// Directory of input images (defaults to `images`). Created when missing.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory for annotated results (defaults to `results`).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory holding the Haar cascade XML files (defaults to `cascades`).
    #[arg(long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Never download missing cascade files; fail instead.
    #[arg(long = "offline", action = ArgAction::SetTrue)]
    pub offline: bool,

    /// Optional settings JSON. Defaults to `config/headcount.json` when present, otherwise built-in parameters.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the per-image counts as JSON to this file.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Run the four detector passes of each image concurrently.
    #[arg(long, action = ArgAction::SetTrue)]
    pub parallel: bool,

    /// How colliding candidates are resolved: `first` or `exhaustive`.
    #[arg(long, value_name = "POLICY")]
    pub collision_policy: Option<CollisionPolicy>,

    /// Override the detector pyramid scale factor.
    #[arg(long)]
    pub scale_factor: Option<f64>,

    /// Override the minimum number of grouped hits per detection.
    #[arg(long)]
    pub min_neighbors: Option<u32>,

    /// Count only; do not write annotated images.
    #[arg(long = "no-annotate", action = ArgAction::SetTrue)]
    pub no_annotate: bool,

    /// Outline color for detections as hex (`#RRGGBB` or `#RRGGBBAA`).
    #[arg(long, value_name = "HEX")]
    pub box_color: Option<String>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,
}
