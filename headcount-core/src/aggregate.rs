use std::fmt;

use log::warn;

use crate::rect::{FrameSize, Rect};

/// Which detector pass produced a set of candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Frontal,
    AltFrontal,
    Profile,
    /// Profile cascade run on the horizontally flipped frame.
    MirroredProfile,
}

impl Orientation {
    /// All passes in aggregation order. Fusion tie-breaks depend on this order.
    pub const ALL: [Orientation; 4] = [
        Orientation::Frontal,
        Orientation::AltFrontal,
        Orientation::Profile,
        Orientation::MirroredProfile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Frontal => "frontal",
            Orientation::AltFrontal => "alt-frontal",
            Orientation::Profile => "profile",
            Orientation::MirroredProfile => "mirrored-profile",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw output of the four detector passes for one image.
///
/// `mirrored_profile` is still in flipped-frame coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorOutputs {
    pub frontal: Vec<Rect>,
    pub alt_frontal: Vec<Rect>,
    pub profile: Vec<Rect>,
    pub mirrored_profile: Vec<Rect>,
}

impl DetectorOutputs {
    /// Mutable slot for a pass, so results can be stored in any completion order.
    pub fn slot_mut(&mut self, orientation: Orientation) -> &mut Vec<Rect> {
        match orientation {
            Orientation::Frontal => &mut self.frontal,
            Orientation::AltFrontal => &mut self.alt_frontal,
            Orientation::Profile => &mut self.profile,
            Orientation::MirroredProfile => &mut self.mirrored_profile,
        }
    }

    pub fn slot(&self, orientation: Orientation) -> &[Rect] {
        match orientation {
            Orientation::Frontal => &self.frontal,
            Orientation::AltFrontal => &self.alt_frontal,
            Orientation::Profile => &self.profile,
            Orientation::MirroredProfile => &self.mirrored_profile,
        }
    }

    /// Total number of raw candidates across all passes.
    pub fn total(&self) -> usize {
        Orientation::ALL.iter().map(|o| self.slot(*o).len()).sum()
    }
}

/// Drop rectangles with non-positive sides reported by a detector.
pub fn sanitize_candidates(orientation: Orientation, rects: Vec<Rect>) -> Vec<Rect> {
    let before = rects.len();
    let valid: Vec<Rect> = rects.into_iter().filter(Rect::is_valid).collect();
    let dropped = before - valid.len();
    if dropped > 0 {
        warn!("{orientation} detector reported {dropped} degenerate rectangle(s); ignoring them");
    }
    valid
}

/// Flatten the four passes into one candidate list.
///
/// Order is frontal, alt-frontal, profile, mirrored-profile. Mirrored-profile
/// rectangles are mapped back into the original frame first.
pub fn aggregate(outputs: &DetectorOutputs, frame: FrameSize) -> Vec<Rect> {
    let mut candidates = Vec::with_capacity(outputs.total());
    candidates.extend_from_slice(&outputs.frontal);
    candidates.extend_from_slice(&outputs.alt_frontal);
    candidates.extend_from_slice(&outputs.profile);
    candidates.extend(
        outputs
            .mirrored_profile
            .iter()
            .map(|rect| rect.mirrored(frame.width)),
    );
    candidates
}
