//! Shared configuration types consumed across the headcount workspace.
//!
//! Every section is `#[serde(default)]` so a settings file only needs to name
//! the values it changes.

use crate::color::RgbaColor;

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Parameters handed to every detector adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    /// Pyramid step between successive detection scales.
    pub scale_factor: f64,
    /// Minimum number of grouped raw hits required to keep a detection.
    pub min_neighbors: u32,
    /// The minimum face side is `frame height / min_size_divisor`.
    pub min_size_divisor: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 4,
            min_size_divisor: 20,
        }
    }
}

/// How a candidate that collides with the current detection set is resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Resolve only the first collision found, then stop scanning.
    #[default]
    #[serde(rename = "first", alias = "first_collision", alias = "first-collision")]
    FirstCollision,
    /// Check every detection: the candidate is dropped if any colliding one is
    /// at least as large, otherwise all colliding detections are replaced by it.
    #[serde(alias = "all")]
    Exhaustive,
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CollisionPolicy::FirstCollision => "first",
            CollisionPolicy::Exhaustive => "exhaustive",
        })
    }
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "first_collision" | "first-collision" => Ok(CollisionPolicy::FirstCollision),
            "exhaustive" | "all" => Ok(CollisionPolicy::Exhaustive),
            other => Err(format!(
                "invalid collision policy '{other}'; expected 'first' or 'exhaustive'"
            )),
        }
    }
}

/// Size filter and overlap resolution parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FusionSettings {
    /// Candidates smaller than `frame area / min_area_divisor` are dropped.
    pub min_area_divisor: f64,
    /// Candidates larger than `frame area / max_area_divisor` are dropped.
    pub max_area_divisor: f64,
    /// Two boxes are the same detection when their intersection exceeds this
    /// fraction of the smaller box.
    pub overlap_threshold: f64,
    pub collision_policy: CollisionPolicy,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            min_area_divisor: 400.0,
            max_area_divisor: 4.0,
            overlap_threshold: 0.3,
            collision_policy: CollisionPolicy::FirstCollision,
        }
    }
}

/// Where images are read from and where annotated copies are written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathSettings {
    pub input_dir: PathBuf,
    pub results_dir: PathBuf,
    /// Literal prefix prepended to the original file name of every result.
    pub output_prefix: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("images"),
            results_dir: PathBuf::from("results"),
            output_prefix: "result_".to_string(),
        }
    }
}

/// Styling for annotated result images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnnotationSettings {
    /// Write annotated copies at all.
    pub enabled: bool,
    pub box_color: RgbaColor,
    /// Outline thickness in pixels.
    pub box_thickness: u32,
    pub marker_color: RgbaColor,
    pub marker_radius: i32,
    pub text_color: RgbaColor,
    /// Label drawn before the count, e.g. `People: 3`.
    pub label: String,
    /// Integer upscaling applied to the built-in glyphs.
    pub text_scale: u32,
    pub text_x: i32,
    pub text_y: i32,
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            box_color: RgbaColor::opaque(0, 255, 0),
            box_thickness: 2,
            marker_color: RgbaColor::opaque(255, 0, 0),
            marker_radius: 2,
            text_color: RgbaColor::opaque(0, 255, 0),
            label: "People".to_string(),
            text_scale: 3,
            text_x: 10,
            text_y: 10,
        }
    }
}

/// Location and origin of the cascade classifier files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssetSettings {
    /// Local cache directory for the cascade XML files.
    pub dir: PathBuf,
    /// Remote directory the files are fetched from when missing.
    pub base_url: String,
    /// Fetch missing files; when `false` a missing file is an error.
    pub fetch_missing: bool,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cascades"),
            base_url: "https://raw.githubusercontent.com/opencv/opencv/master/data/haarcascades"
                .to_string(),
            fetch_missing: true,
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub detection: DetectionSettings,
    pub fusion: FusionSettings,
    pub paths: PathSettings,
    pub annotation: AnnotationSettings,
    pub assets: AssetSettings,
    pub telemetry: TelemetrySettings,
    /// Run the four detector passes of an image concurrently.
    pub parallel_detectors: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            detection: DetectionSettings::default(),
            fusion: FusionSettings::default(),
            paths: PathSettings::default(),
            annotation: AnnotationSettings::default(),
            assets: AssetSettings::default(),
            telemetry: TelemetrySettings::default(),
            parallel_detectors: false,
        }
    }
}

impl AppSettings {
    /// Load settings from a JSON file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, overwriting any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    /// Reject values the detection and fusion stages cannot work with.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.detection.scale_factor > 1.0,
            "detection.scale_factor must be greater than 1.0 (got {})",
            self.detection.scale_factor
        );
        anyhow::ensure!(
            self.detection.min_size_divisor > 0,
            "detection.min_size_divisor must be non-zero"
        );
        anyhow::ensure!(
            self.fusion.min_area_divisor > 0.0 && self.fusion.max_area_divisor > 0.0,
            "fusion area divisors must be positive"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.fusion.overlap_threshold),
            "fusion.overlap_threshold must lie in 0.0..=1.0 (got {})",
            self.fusion.overlap_threshold
        );
        Ok(())
    }
}

/// Returns the default path for persisted settings (`config/headcount.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/headcount.json"))
        .unwrap_or_else(|_| PathBuf::from("config/headcount.json"))
}
