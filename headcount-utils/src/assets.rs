//! Resolution of the cascade classifier files.
//!
//! The [`AssetStore`] owns the local cache directory. Files that are already
//! present are used as-is; missing files are fetched once through an
//! [`AssetFetcher`] and written next to the others.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use log::{debug, info};

use crate::config::AssetSettings;

/// A cascade definition file known to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeAsset {
    pub name: &'static str,
    pub filename: &'static str,
}

pub const FRONTAL_FACE: CascadeAsset = CascadeAsset {
    name: "frontal_face",
    filename: "haarcascade_frontalface_default.xml",
};

pub const FRONTAL_FACE_ALT: CascadeAsset = CascadeAsset {
    name: "frontal_face_alt",
    filename: "haarcascade_frontalface_alt.xml",
};

pub const PROFILE_FACE: CascadeAsset = CascadeAsset {
    name: "profile_face",
    filename: "haarcascade_profileface.xml",
};

/// Every cascade the counting pipeline needs.
pub const CASCADE_ASSETS: [CascadeAsset; 3] = [FRONTAL_FACE, FRONTAL_FACE_ALT, PROFILE_FACE];

/// Source of asset bytes for files missing from the local cache.
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP(S) fetcher.
#[derive(Debug, Default)]
pub struct HttpFetcher;

impl AssetFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;
        let response = client
            .get(url)
            .send()
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("server rejected request for {url}"))?;
        let bytes = response
            .bytes()
            .with_context(|| format!("failed to read response body from {url}"))?;
        Ok(bytes.to_vec())
    }
}

/// Paths of the three resolved cascade files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCascades {
    pub frontal: PathBuf,
    pub frontal_alt: PathBuf,
    pub profile: PathBuf,
}

/// Local cache of cascade files with on-demand fetching.
pub struct AssetStore {
    dir: PathBuf,
    base_url: String,
    fetch_missing: bool,
    fetcher: Box<dyn AssetFetcher>,
}

impl AssetStore {
    /// Store rooted at `dir` that fetches missing files from `base_url` over HTTP.
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into(),
            fetch_missing: true,
            fetcher: Box::new(HttpFetcher),
        }
    }

    pub fn from_settings(settings: &AssetSettings) -> Self {
        Self::new(settings.dir.clone(), settings.base_url.clone())
            .fetch_missing(settings.fetch_missing)
    }

    /// Replace the fetcher used for missing files.
    pub fn with_fetcher(mut self, fetcher: Box<dyn AssetFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn fetch_missing(mut self, enabled: bool) -> Self {
        self.fetch_missing = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local path of `asset`, whether or not it exists yet.
    pub fn path_for(&self, asset: &CascadeAsset) -> PathBuf {
        self.dir.join(asset.filename)
    }

    /// Remote location of `asset`.
    pub fn url_for(&self, asset: &CascadeAsset) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), asset.filename)
    }

    /// Return the local path of `asset`, fetching it first when missing.
    pub fn resolve(&self, asset: &CascadeAsset) -> Result<PathBuf> {
        let path = self.path_for(asset);
        if path.is_file() {
            debug!("Using cached cascade {} at {}", asset.name, path.display());
            return Ok(path);
        }
        if !self.fetch_missing {
            anyhow::bail!(
                "cascade {} not found at {} and fetching is disabled",
                asset.name,
                path.display()
            );
        }

        let url = self.url_for(asset);
        info!("Downloading cascade {} from {url}", asset.name);
        let bytes = self
            .fetcher
            .fetch(&url)
            .with_context(|| format!("failed to fetch cascade {}", asset.name))?;
        if bytes.is_empty() {
            return Err(anyhow!("fetched cascade {} is empty", asset.name));
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create asset directory {}", self.dir.display()))?;
        // A cached file is either complete or absent.
        let partial = path.with_extension("xml.part");
        fs::write(&partial, &bytes)
            .with_context(|| format!("failed to write {}", partial.display()))?;
        fs::rename(&partial, &path)
            .with_context(|| format!("failed to move cascade into {}", path.display()))?;
        info!("Cached cascade {} at {}", asset.name, path.display());
        Ok(path)
    }

    /// Resolve all three cascades.
    pub fn resolve_all(&self) -> Result<ResolvedCascades> {
        Ok(ResolvedCascades {
            frontal: self.resolve(&FRONTAL_FACE)?,
            frontal_alt: self.resolve(&FRONTAL_FACE_ALT)?,
            profile: self.resolve(&PROFILE_FACE)?,
        })
    }
}
