//! Boosted Haar cascade classifier compatible with OpenCV's trained models.
//!
//! Models are read from the `opencv-cascade-classifier` XML layout shipped
//! as `haarcascade_*.xml`. Detection scans an image pyramid with a sliding
//! window and clusters the raw hits the way OpenCV's `detectMultiScale` does.

mod grouping;
mod integral;
mod model;
mod xml;

use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
};

use image::{GrayImage, imageops};
use log::{debug, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::detector::{CandidateDetector, DetectionParams};
use crate::rect::Rect;

use grouping::{GROUP_EPS, group_rectangles};
use integral::IntegralImages;
use model::{HaarFeature, Stage, Verdict, Window, classify};

/// Errors raised while loading a cascade model.
#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("failed to read cascade file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cascade XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("cascade is missing required element <{0}>")]
    MissingElement(&'static str),
    #[error("invalid number '{value}' in <{element}>")]
    InvalidNumber {
        element: &'static str,
        value: String,
    },
    #[error("unsupported cascade {kind} '{value}'")]
    Unsupported { kind: &'static str, value: String },
    #[error("legacy opencv-haar-classifier files are not supported; convert the model first")]
    LegacyFormat,
    #[error("weak classifier references feature {index} but the cascade defines {count}")]
    FeatureOutOfRange { index: usize, count: usize },
    #[error("invalid cascade: {0}")]
    Invalid(String),
}

/// A loaded Haar cascade.
#[derive(Debug, Clone)]
pub struct HaarCascade {
    name: String,
    window: (u32, u32),
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
    has_tilted: bool,
}

/// One pyramid level: the image is shrunk by `factor` and scanned with the
/// base window, which corresponds to `window` pixels in the original frame.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScaleLevel {
    factor: f64,
    window: (u32, u32),
    scaled: (u32, u32),
}

impl HaarCascade {
    /// Load a cascade from disk. The file stem becomes the cascade name.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CascadeError> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path).map_err(|source| CascadeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cascade".to_string());
        let cascade = Self::from_xml_str(&xml)?.with_name(name);
        debug!(
            "Loaded cascade '{}' from {} ({} stages, {} features, window {}x{})",
            cascade.name,
            path.display(),
            cascade.stages.len(),
            cascade.features.len(),
            cascade.window.0,
            cascade.window.1
        );
        Ok(cascade)
    }

    /// Parse a cascade from XML text.
    pub fn from_xml_str(xml: &str) -> Result<Self, CascadeError> {
        let parsed = xml::parse(xml)?;
        let has_tilted = parsed.features.iter().any(|f| f.tilted);
        Ok(Self {
            name: "cascade".to_string(),
            window: parsed.window,
            stages: parsed.stages,
            features: parsed.features,
            has_tilted,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Base detection window (width, height) the cascade was trained on.
    pub fn window_size(&self) -> (u32, u32) {
        self.window
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Every window the cascade accepts across the pyramid, before grouping.
    ///
    /// Hits are reported in frame coordinates, ordered by scale then row.
    pub fn detect_raw(&self, gray: &GrayImage, params: &DetectionParams) -> Vec<Rect> {
        if params.scale_factor.is_nan() || params.scale_factor <= 1.0 {
            warn!(
                "Cascade '{}' skipped: scale factor {} must be greater than 1",
                self.name, params.scale_factor
            );
            return Vec::new();
        }

        let levels = self.scale_levels(gray.dimensions(), params);
        levels
            .par_iter()
            .map(|level| self.scan_level(gray, level))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    fn scale_levels(&self, (img_w, img_h): (u32, u32), params: &DetectionParams) -> Vec<ScaleLevel> {
        let (win_w, win_h) = self.window;
        let (max_w, max_h) = params.max_size.unwrap_or((img_w, img_h));
        let (min_w, min_h) = params.min_size;

        let mut levels = Vec::new();
        let mut factor = 1.0f64;
        loop {
            let window = (
                (win_w as f64 * factor).round() as u32,
                (win_h as f64 * factor).round() as u32,
            );
            let scaled = (
                (img_w as f64 / factor).round() as u32,
                (img_h as f64 / factor).round() as u32,
            );
            if scaled.0 < win_w || scaled.1 < win_h {
                break;
            }
            if window.0 > max_w || window.1 > max_h {
                break;
            }
            if window.0 >= min_w && window.1 >= min_h {
                levels.push(ScaleLevel {
                    factor,
                    window,
                    scaled,
                });
            }
            factor *= params.scale_factor;
        }
        levels
    }

    fn scan_level(&self, gray: &GrayImage, level: &ScaleLevel) -> Vec<Rect> {
        let image: Cow<'_, GrayImage> = if gray.dimensions() == level.scaled {
            Cow::Borrowed(gray)
        } else {
            Cow::Owned(imageops::resize(
                gray,
                level.scaled.0,
                level.scaled.1,
                imageops::FilterType::Triangle,
            ))
        };
        let ii = IntegralImages::new(&image, self.has_tilted);

        let (win_w, win_h) = (self.window.0 as usize, self.window.1 as usize);
        let max_x = ii.width() - win_w;
        let max_y = ii.height() - win_h;
        let step = if level.factor > 2.0 { 1 } else { 2 };

        let mut hits = Vec::new();
        for y in (0..=max_y).step_by(step) {
            let mut x = 0;
            while x <= max_x {
                let window = Window::place(&ii, x, y, win_w, win_h);
                match classify(&self.stages, &self.features, window.as_ref()) {
                    Verdict::Accepted => hits.push(Rect::new(
                        (x as f64 * level.factor).round_ties_even() as i32,
                        (y as f64 * level.factor).round_ties_even() as i32,
                        level.window.0 as i32,
                        level.window.1 as i32,
                    )),
                    // First stage rejected: skip the next position too.
                    Verdict::RejectedAt(0) => x += step,
                    _ => {}
                }
                x += step;
            }
        }
        hits
    }
}

impl CandidateDetector for HaarCascade {
    fn detect(&self, gray: &GrayImage, params: &DetectionParams) -> Vec<Rect> {
        let raw = self.detect_raw(gray, params);
        let grouped = group_rectangles(&raw, params.min_neighbors, GROUP_EPS);
        debug!(
            "Cascade '{}': {} raw hit(s) grouped into {} detection(s)",
            self.name,
            raw.len(),
            grouped.len()
        );
        grouped
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use headcount_utils::load_fixture_string;
    use image::Luma;
    use std::io::Write;

    fn edge_cascade() -> HaarCascade {
        let xml = load_fixture_string("cascades/edge_cascade.xml").expect("cascade fixture");
        HaarCascade::from_xml_str(&xml).expect("parse cascade")
    }

    fn vertical_edge(width: u32, height: u32, edge: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([if x < edge { 0 } else { 255 }]))
    }

    fn single_scale(window: u32) -> DetectionParams {
        DetectionParams {
            scale_factor: 1.1,
            min_neighbors: 0,
            min_size: (0, 0),
            max_size: Some((window, window)),
        }
    }

    #[test]
    fn parses_fixture_cascade() {
        let cascade = edge_cascade();
        assert_eq!(cascade.window_size(), (6, 6));
        assert_eq!(cascade.stage_count(), 1);
        assert_eq!(cascade.feature_count(), 1);
        assert!(!cascade.has_tilted);
        assert!((cascade.stages[0].threshold - (0.5 - 1e-5)).abs() < 1e-12);
    }

    #[test]
    fn raw_hits_straddle_the_edge() {
        let cascade = edge_cascade();
        let img = vertical_edge(40, 40, 20);
        let hits = cascade.detect_raw(&img, &single_scale(6));
        // Even columns 16 and 18 are the only windows whose inner area sees the edge.
        assert_eq!(hits.len(), 2 * 18);
        for hit in &hits {
            assert!(hit.x == 16 || hit.x == 18, "unexpected hit {hit:?}");
            assert_eq!((hit.width, hit.height), (6, 6));
        }
    }

    #[test]
    fn uniform_image_produces_nothing() {
        let cascade = edge_cascade();
        let img = GrayImage::from_pixel(64, 48, Luma([128]));
        assert!(cascade.detect(&img, &DetectionParams::default()).is_empty());
    }

    #[test]
    fn scale_levels_respect_bounds() {
        let cascade = edge_cascade();
        let params = DetectionParams {
            scale_factor: 1.5,
            min_neighbors: 3,
            min_size: (9, 9),
            max_size: None,
        };
        let levels = cascade.scale_levels((30, 30), &params);
        let windows: Vec<u32> = levels.iter().map(|l| l.window.0).collect();
        // 6 is below the minimum; 1.5^4 * 6 = 30.4 rounds to 30, still inside the frame.
        assert_eq!(windows, vec![9, 14, 20, 30]);
        assert_eq!(levels[0].scaled, (20, 20));
    }

    #[test]
    fn image_smaller_than_window_is_skipped() {
        let cascade = edge_cascade();
        let img = vertical_edge(5, 5, 2);
        assert!(cascade.detect_raw(&img, &DetectionParams::default()).is_empty());
    }

    #[test]
    fn non_increasing_scale_factor_is_rejected() {
        let cascade = edge_cascade();
        let params = DetectionParams {
            scale_factor: 1.0,
            ..DetectionParams::default()
        };
        assert!(cascade.detect_raw(&vertical_edge(40, 40, 20), &params).is_empty());
    }

    #[test]
    fn from_path_names_cascade_after_file() {
        let xml = load_fixture_string("cascades/edge_cascade.xml").expect("cascade fixture");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("haarcascade_test.xml");
        let mut file = fs::File::create(&path).expect("create");
        file.write_all(xml.as_bytes()).expect("write");

        let cascade = HaarCascade::from_path(&path).expect("load");
        assert_eq!(CandidateDetector::name(&cascade), "haarcascade_test");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = HaarCascade::from_path("/definitely/not/here.xml").unwrap_err();
        assert!(matches!(err, CascadeError::Io { .. }));
        assert!(err.to_string().contains("here.xml"));
    }

    #[test]
    fn legacy_format_is_rejected() {
        let xml = r#"<?xml version="1.0"?>
<opencv_storage>
<haarcascade_frontalface type_id="opencv-haar-classifier">
  <size>20 20</size>
  <stages></stages>
</haarcascade_frontalface>
</opencv_storage>"#;
        assert!(matches!(
            HaarCascade::from_xml_str(xml),
            Err(CascadeError::LegacyFormat)
        ));
    }

    #[test]
    fn non_haar_features_are_rejected() {
        let xml = load_fixture_string("cascades/edge_cascade.xml")
            .expect("cascade fixture")
            .replace("<featureType>HAAR", "<featureType>LBP");
        let err = HaarCascade::from_xml_str(&xml).unwrap_err();
        assert!(matches!(err, CascadeError::Unsupported { kind: "feature type", .. }));
    }

    #[test]
    fn bad_numbers_and_dangling_features_are_rejected() {
        let fixture = load_fixture_string("cascades/edge_cascade.xml").expect("cascade fixture");

        let bad_number = fixture.replace("-1. 1.", "-1. one");
        assert!(matches!(
            HaarCascade::from_xml_str(&bad_number),
            Err(CascadeError::InvalidNumber { element: "leafValues", .. })
        ));

        let dangling = fixture.replace("0 -1 0 0.", "0 -1 3 0.");
        assert!(matches!(
            HaarCascade::from_xml_str(&dangling),
            Err(CascadeError::FeatureOutOfRange { index: 3, count: 1 })
        ));

        let oversized = fixture.replace("3 0 3 6 2.", "3 0 4 6 2.");
        assert!(matches!(
            HaarCascade::from_xml_str(&oversized),
            Err(CascadeError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            HaarCascade::from_xml_str("<opencv_storage><cascade>"),
            Err(CascadeError::Xml(_))
        ));
    }
}
