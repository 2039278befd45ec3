//! Common helpers shared across the headcount crates.

/// Cascade file resolution, caching and fetching.
pub mod assets;
/// Small RGBA color type and hex parsing.
pub mod color;
/// Application configuration and settings management.
pub mod config;
/// Test fixture discovery helpers.
pub mod fixtures;
/// Image loading, grayscale conversion and histogram equalization.
pub mod image_utils;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use assets::{
    AssetFetcher, AssetStore, CASCADE_ASSETS, CascadeAsset, FRONTAL_FACE, FRONTAL_FACE_ALT,
    HttpFetcher, PROFILE_FACE, ResolvedCascades,
};
pub use color::{RgbaColor, parse_hex_color};
pub use fixtures::{fixture_path, fixtures_dir, load_fixture_json, load_fixture_string};
pub use image_utils::{
    equalize_histogram, load_image, mirror_horizontal, to_equalized_gray, to_gray,
};
pub use telemetry::{
    TimingGuard, configure as configure_telemetry, telemetry_allows, telemetry_enabled,
    telemetry_level, timing_guard, timing_guard_if,
};

/// Initialize logging once.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(telemetry::TELEMETRY_TARGET, LevelFilter::Trace);

    // A logger installed earlier (e.g. by a test harness) stays in place.
    builder.try_init().ok();
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LevelFilter::Info).expect("first init");
        init_logging(LevelFilter::Debug).expect("second init");
    }
}
