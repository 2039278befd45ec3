//! Configuration loading and CLI override logic.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};
use headcount_utils::{
    config::{AppSettings, default_settings_path},
    normalize_path, parse_hex_color,
};

use crate::args::CountArgs;

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Apply command-line arguments on top of loaded or default settings.
pub fn apply_cli_overrides(settings: &mut AppSettings, args: &CountArgs) {
    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim();
        if !normalized.is_empty() {
            let lower = normalized.to_ascii_lowercase();
            settings.telemetry.level = lower.clone();
            if lower == "off" {
                settings.telemetry.enabled = false;
            }
        }
    }

    if let Some(input) = args.input.as_ref() {
        settings.paths.input_dir = input.clone();
    }
    if let Some(output) = args.output.as_ref() {
        settings.paths.results_dir = output.clone();
    }
    if let Some(assets) = args.assets.as_ref() {
        settings.assets.dir = assets.clone();
    }
    if args.offline {
        settings.assets.fetch_missing = false;
    }

    if args.parallel {
        settings.parallel_detectors = true;
    }
    if let Some(policy) = args.collision_policy {
        settings.fusion.collision_policy = policy;
    }
    if let Some(scale) = args.scale_factor {
        settings.detection.scale_factor = scale;
    }
    if let Some(min_neighbors) = args.min_neighbors {
        settings.detection.min_neighbors = min_neighbors;
    }

    if args.no_annotate {
        settings.annotation.enabled = false;
    }
    if let Some(spec) = args.box_color.as_ref() {
        match parse_hex_color(spec) {
            Some(color) => settings.annotation.box_color = color,
            None => warn!("failed to parse --box-color '{spec}'; keeping the configured color"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use headcount_utils::{RgbaColor, config::CollisionPolicy};

    fn parse(args: &[&str]) -> CountArgs {
        CountArgs::parse_from(std::iter::once("headcount").chain(args.iter().copied()))
    }

    #[test]
    fn no_flags_keep_defaults() {
        let mut settings = AppSettings::default();
        apply_cli_overrides(&mut settings, &parse(&[]));
        assert_eq!(settings.paths.input_dir, PathBuf::from("images"));
        assert_eq!(settings.paths.results_dir, PathBuf::from("results"));
        assert_eq!(settings.fusion.collision_policy, CollisionPolicy::FirstCollision);
        assert!(settings.annotation.enabled);
        assert!(settings.assets.fetch_missing);
        assert!(!settings.parallel_detectors);
    }

    #[test]
    fn flags_override_settings() {
        let mut settings = AppSettings::default();
        let args = parse(&[
            "--input",
            "in",
            "--output",
            "out",
            "--assets",
            "models",
            "--offline",
            "--parallel",
            "--collision-policy",
            "exhaustive",
            "--scale-factor",
            "1.2",
            "--min-neighbors",
            "2",
            "--no-annotate",
            "--box-color",
            "#0000ff",
        ]);
        apply_cli_overrides(&mut settings, &args);
        assert_eq!(settings.paths.input_dir, PathBuf::from("in"));
        assert_eq!(settings.paths.results_dir, PathBuf::from("out"));
        assert_eq!(settings.assets.dir, PathBuf::from("models"));
        assert!(!settings.assets.fetch_missing);
        assert!(settings.parallel_detectors);
        assert_eq!(settings.fusion.collision_policy, CollisionPolicy::Exhaustive);
        assert_eq!(settings.detection.scale_factor, 1.2);
        assert_eq!(settings.detection.min_neighbors, 2);
        assert!(!settings.annotation.enabled);
        assert_eq!(settings.annotation.box_color, RgbaColor::opaque(0, 0, 255));
    }

    #[test]
    fn telemetry_level_off_disables_telemetry() {
        let mut settings = AppSettings::default();
        apply_cli_overrides(&mut settings, &parse(&["--telemetry", "--telemetry-level", "OFF"]));
        assert!(!settings.telemetry.enabled);
        assert_eq!(settings.telemetry.level, "off");
    }

    #[test]
    fn invalid_box_color_is_ignored() {
        let mut settings = AppSettings::default();
        apply_cli_overrides(&mut settings, &parse(&["--box-color", "not-a-color"]));
        assert_eq!(settings.annotation.box_color, RgbaColor::opaque(0, 255, 0));
    }

    #[test]
    fn unknown_collision_policy_is_a_parse_error() {
        let result = CountArgs::try_parse_from(["headcount", "--collision-policy", "sometimes"]);
        assert!(result.is_err());
    }
}
