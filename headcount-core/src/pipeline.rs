use std::sync::Arc;

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage};
use log::{Level, debug};

use headcount_utils::{
    ResolvedCascades, config::DetectionSettings, mirror_horizontal, timing_guard,
    to_equalized_gray,
};

use crate::aggregate::{DetectorOutputs, Orientation, aggregate, sanitize_candidates};
use crate::cascade::HaarCascade;
use crate::detector::{CandidateDetector, DetectionParams};
use crate::fusion::{Fusion, FusionConfig, fuse};
use crate::rect::{FrameSize, Rect};

/// The three classifiers behind the four detector passes.
///
/// `profile` serves both the profile and the mirrored-profile pass.
#[derive(Clone)]
pub struct CascadeSet {
    pub frontal: Arc<dyn CandidateDetector>,
    pub alt_frontal: Arc<dyn CandidateDetector>,
    pub profile: Arc<dyn CandidateDetector>,
}

impl CascadeSet {
    pub fn new(
        frontal: Arc<dyn CandidateDetector>,
        alt_frontal: Arc<dyn CandidateDetector>,
        profile: Arc<dyn CandidateDetector>,
    ) -> Self {
        Self {
            frontal,
            alt_frontal,
            profile,
        }
    }

    /// Load the Haar cascades at the resolved paths.
    pub fn load(paths: &ResolvedCascades) -> Result<Self> {
        let _guard = timing_guard("headcount_core::load_cascades", Level::Debug);
        let load = |path: &std::path::Path| -> Result<Arc<dyn CandidateDetector>> {
            let cascade = HaarCascade::from_path(path)
                .with_context(|| format!("failed to load cascade {}", path.display()))?;
            Ok(Arc::new(cascade))
        };
        Ok(Self {
            frontal: load(&paths.frontal)?,
            alt_frontal: load(&paths.frontal_alt)?,
            profile: load(&paths.profile)?,
        })
    }

    fn for_pass(&self, orientation: Orientation) -> &dyn CandidateDetector {
        match orientation {
            Orientation::Frontal => self.frontal.as_ref(),
            Orientation::AltFrontal => self.alt_frontal.as_ref(),
            Orientation::Profile | Orientation::MirroredProfile => self.profile.as_ref(),
        }
    }
}

/// Counters describing what fusion did with the candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FusionStats {
    pub filtered_out: usize,
    pub displaced: usize,
    pub absorbed: usize,
}

impl From<&Fusion> for FusionStats {
    fn from(fusion: &Fusion) -> Self {
        Self {
            filtered_out: fusion.filtered_out,
            displaced: fusion.displaced,
            absorbed: fusion.absorbed,
        }
    }
}

/// Result of counting one image.
#[derive(Debug, Clone, PartialEq)]
pub struct CountOutput {
    /// Final, de-duplicated detections. One per person.
    pub detections: Vec<Rect>,
    /// Aggregated candidates in fusion order.
    pub candidates: Vec<Rect>,
    /// Raw per-pass output, mirrored-profile still in flipped coordinates.
    pub passes: DetectorOutputs,
    pub frame: FrameSize,
    pub stats: FusionStats,
}

impl CountOutput {
    /// Number of people found.
    pub fn count(&self) -> usize {
        self.detections.len()
    }
}

/// Runs the four detector passes on an image and fuses their output.
pub struct PeopleCounter {
    cascades: CascadeSet,
    detection: DetectionSettings,
    fusion: FusionConfig,
    parallel: bool,
}

impl PeopleCounter {
    pub fn new(cascades: CascadeSet, detection: DetectionSettings, fusion: FusionConfig) -> Self {
        Self {
            cascades,
            detection,
            fusion,
            parallel: false,
        }
    }

    /// Run the four passes of each image concurrently.
    pub fn with_parallel_detectors(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn fusion_config(&self) -> &FusionConfig {
        &self.fusion
    }

    /// Count people in a decoded image.
    pub fn count_image(&self, image: &DynamicImage) -> Result<CountOutput> {
        let _guard = timing_guard("headcount_core::count_image", Level::Debug);
        anyhow::ensure!(
            image.width() > 0 && image.height() > 0,
            "cannot count people in an empty {}x{} image",
            image.width(),
            image.height()
        );
        let gray = to_equalized_gray(image);
        self.count_gray(&gray)
    }

    /// Count people in a frame that is already grayscale and equalized.
    pub fn count_gray(&self, gray: &GrayImage) -> Result<CountOutput> {
        let frame = FrameSize::from(gray.dimensions());
        anyhow::ensure!(
            !frame.is_empty(),
            "cannot count people in an empty {}x{} frame",
            frame.width,
            frame.height
        );

        let params = DetectionParams::for_frame(frame, &self.detection);
        let passes = if self.parallel {
            self.run_parallel(gray, &params)
        } else {
            self.run_sequential(gray, &params)
        };

        let candidates = aggregate(&passes, frame);
        let fusion = {
            let _guard = timing_guard("headcount_core::fuse", Level::Trace);
            fuse(&candidates, frame, &self.fusion)
        };
        debug!(
            "{}x{} frame: {} candidate(s), {} filtered, {} displaced, {} absorbed, {} counted",
            frame.width,
            frame.height,
            candidates.len(),
            fusion.filtered_out,
            fusion.displaced,
            fusion.absorbed,
            fusion.count()
        );

        let stats = FusionStats::from(&fusion);
        Ok(CountOutput {
            detections: fusion.detections,
            candidates,
            passes,
            frame,
            stats,
        })
    }

    fn run_pass(&self, orientation: Orientation, frame: &GrayImage, params: &DetectionParams) -> Vec<Rect> {
        let detector = self.cascades.for_pass(orientation);
        let _guard = timing_guard(
            format!("headcount_core::pass::{}", orientation.as_str()),
            Level::Trace,
        );
        let rects = sanitize_candidates(orientation, detector.detect(frame, params));
        debug!(
            "{orientation} pass ({}) produced {} candidate(s)",
            detector.name(),
            rects.len()
        );
        rects
    }

    fn run_sequential(&self, gray: &GrayImage, params: &DetectionParams) -> DetectorOutputs {
        let mirrored = mirror_horizontal(gray);
        let mut outputs = DetectorOutputs::default();
        for orientation in Orientation::ALL {
            let frame = match orientation {
                Orientation::MirroredProfile => &mirrored,
                _ => gray,
            };
            *outputs.slot_mut(orientation) = self.run_pass(orientation, frame, params);
        }
        outputs
    }

    fn run_parallel(&self, gray: &GrayImage, params: &DetectionParams) -> DetectorOutputs {
        let ((frontal, alt_frontal), (profile, mirrored_profile)) = rayon::join(
            || {
                rayon::join(
                    || self.run_pass(Orientation::Frontal, gray, params),
                    || self.run_pass(Orientation::AltFrontal, gray, params),
                )
            },
            || {
                rayon::join(
                    || self.run_pass(Orientation::Profile, gray, params),
                    || {
                        let mirrored = mirror_horizontal(gray);
                        self.run_pass(Orientation::MirroredProfile, &mirrored, params)
                    },
                )
            },
        );
        DetectorOutputs {
            frontal,
            alt_frontal,
            profile,
            mirrored_profile,
        }
    }
}
