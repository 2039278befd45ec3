//! Input directory preparation and image discovery.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info};
use walkdir::WalkDir;

/// Extensions (lower-case) treated as images.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// State of the input directory before the batch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDir {
    Existing,
    /// The directory was missing and has just been created empty.
    Created,
}

/// Make sure the input directory exists, creating it when absent.
pub fn prepare_input_dir(path: &Path) -> Result<InputDir> {
    if path.is_dir() {
        return Ok(InputDir::Existing);
    }
    anyhow::ensure!(
        !path.exists(),
        "input path exists but is not a directory: {}",
        path.display()
    );
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create input directory {}", path.display()))?;
    info!("Created input directory {}", path.display());
    Ok(InputDir::Created)
}

/// Whether `path` carries one of [`IMAGE_EXTENSIONS`], ignoring case.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Collect the images directly inside `dir`, sorted by path. Subdirectories
/// are not visited.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    anyhow::ensure!(dir.is_dir(), "input directory not found: {}", dir.display());

    let mut images = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        if has_image_extension(entry.path()) {
            images.push(entry.path().to_path_buf());
        } else {
            debug!("Skipping non-image file {}", entry.path().display());
        }
    }
    images.sort();
    Ok(images)
}

/// Destination of the annotated copy of `image`: `<results_dir>/<prefix><file name>`.
pub fn result_path(image: &Path, results_dir: &Path, prefix: &str) -> PathBuf {
    let mut name = OsString::from(prefix);
    name.push(
        image
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("frame.png")),
    );
    results_dir.join(name)
}
