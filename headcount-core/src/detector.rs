use image::GrayImage;

use headcount_utils::config::DetectionSettings;

use crate::rect::{FrameSize, Rect};

/// Per-image parameters every detector pass receives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Pyramid step between scales, strictly greater than 1.
    pub scale_factor: f64,
    /// Grouped raw hits a detection needs to survive.
    pub min_neighbors: u32,
    /// Smallest window (width, height) considered.
    pub min_size: (u32, u32),
    /// Largest window considered; `None` means the whole frame.
    pub max_size: Option<(u32, u32)>,
}

impl DetectionParams {
    /// Derive parameters for a frame; the minimum face side scales with frame height.
    pub fn for_frame(frame: FrameSize, settings: &DetectionSettings) -> Self {
        let side = frame.height / settings.min_size_divisor.max(1);
        Self {
            scale_factor: settings.scale_factor,
            min_neighbors: settings.min_neighbors,
            min_size: (side, side),
            max_size: None,
        }
    }
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 4,
            min_size: (0, 0),
            max_size: None,
        }
    }
}

/// A black-box classifier that proposes face rectangles on a grayscale frame.
///
/// Implementations must report rectangles in the coordinates of the frame
/// they were given.
pub trait CandidateDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage, params: &DetectionParams) -> Vec<Rect>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
