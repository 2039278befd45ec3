mod annotate;
mod args;
mod config;
mod glyphs;
mod input;
mod types;

use std::{
    fs::{self, File},
    path::Path,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use headcount_core::{CascadeSet, FusionConfig, PeopleCounter};
use headcount_utils::{
    AssetStore, config::AppSettings, configure_telemetry, init_logging, load_image,
};

use crate::{
    annotate::save_annotated,
    args::CountArgs,
    config::{apply_cli_overrides, load_settings},
    input::{InputDir, collect_images, prepare_input_dir, result_path},
    types::{BatchSummary, ImageCount},
};

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = CountArgs::parse();

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);
    settings.validate()?;

    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    let input_dir = settings.paths.input_dir.clone();
    let mut summary = BatchSummary::new(&input_dir, settings.fusion.collision_policy);

    if prepare_input_dir(&input_dir)? == InputDir::Created {
        info!(
            "Input directory {} was missing and has been created; add images and run again",
            input_dir.display()
        );
        return finish(&summary, args.json.as_deref());
    }

    let images = collect_images(&input_dir)?;
    if images.is_empty() {
        info!(
            "No images found in {} (supported extensions: jpg, jpeg, png, bmp)",
            input_dir.display()
        );
        return finish(&summary, args.json.as_deref());
    }

    let counter = build_counter(&settings)?;

    info!("Analyzing {} image(s)...", images.len());
    for image_path in &images {
        let entry = process_image(&counter, image_path, &settings);
        match entry.error.as_ref() {
            None => println!("{}: {} people detected", display_name(image_path), entry.count),
            Some(_) => println!("{}: failed, counted as 0", display_name(image_path)),
        }
        summary.push(entry);
    }

    info!(
        "Done: {} processed, {} failed, {} people in total",
        summary.processed, summary.failed, summary.total_people
    );
    if settings.annotation.enabled {
        info!(
            "Annotated images were written to {}",
            settings.paths.results_dir.display()
        );
    }

    finish(&summary, args.json.as_deref())
}

/// Resolve the cascade files and load the three classifiers.
fn build_counter(settings: &AppSettings) -> Result<PeopleCounter> {
    let store = AssetStore::from_settings(&settings.assets);
    let resolved = store.resolve_all().with_context(|| {
        format!(
            "failed to resolve cascade files in {}",
            store.dir().display()
        )
    })?;
    let cascades = CascadeSet::load(&resolved)?;

    let counter = PeopleCounter::new(
        cascades,
        settings.detection.clone(),
        FusionConfig::from(&settings.fusion),
    )
    .with_parallel_detectors(settings.parallel_detectors);

    let fusion = counter.fusion_config();
    info!(
        "Fusion: {} collision policy, overlap threshold {}, parallel passes {}",
        fusion.collision_policy, fusion.overlap_threshold, settings.parallel_detectors
    );
    Ok(counter)
}

/// Count one image and write its annotated copy. Failures are recorded in the
/// returned entry instead of aborting the batch.
fn process_image(counter: &PeopleCounter, image_path: &Path, settings: &AppSettings) -> ImageCount {
    let counted = load_image(image_path).and_then(|image| {
        let output = counter.count_image(&image)?;
        Ok((image, output))
    });

    let (image, output) = match counted {
        Ok(pair) => pair,
        Err(err) => {
            warn!("Failed to process {}: {err:#}", image_path.display());
            return ImageCount::failed(image_path, &err);
        }
    };

    info!(
        "{} -> {} people ({} candidates)",
        image_path.display(),
        output.count(),
        output.candidates.len()
    );

    let mut entry = ImageCount::from_output(image_path, &output);
    if settings.annotation.enabled {
        let destination = result_path(
            image_path,
            &settings.paths.results_dir,
            &settings.paths.output_prefix,
        );
        match save_annotated(&image, &output.detections, &settings.annotation, &destination) {
            Ok(()) => {
                info!("Annotated image saved to {}", destination.display());
                entry.annotated = Some(destination.display().to_string());
            }
            Err(err) => warn!("Failed to annotate {}: {err:#}", image_path.display()),
        }
    }
    entry
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Write the summary JSON when requested.
fn finish(summary: &BatchSummary, json_path: Option<&Path>) -> Result<()> {
    let Some(json_path) = json_path else {
        return Ok(());
    };
    if let Some(dir) = json_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    let file = File::create(json_path)
        .with_context(|| format!("failed to create {}", json_path.display()))?;
    serde_json::to_writer_pretty(file, summary)
        .with_context(|| format!("failed to write summary JSON to {}", json_path.display()))?;
    info!("Wrote summary to {}", json_path.display());
    Ok(())
}
