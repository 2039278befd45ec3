use log::trace;

use headcount_utils::config::{CollisionPolicy, FusionSettings};

use crate::rect::{FrameSize, Rect};

/// Parameters of the fusion engine.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    /// Lower area bound is `frame area / min_area_divisor`.
    pub min_area_divisor: f64,
    /// Upper area bound is `frame area / max_area_divisor`.
    pub max_area_divisor: f64,
    /// Fraction of the smaller rectangle's area the intersection must exceed
    /// for two rectangles to count as the same person.
    pub overlap_threshold: f64,
    pub collision_policy: CollisionPolicy,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            min_area_divisor: 400.0,
            max_area_divisor: 4.0,
            overlap_threshold: 0.3,
            collision_policy: CollisionPolicy::FirstCollision,
        }
    }
}

impl From<&FusionSettings> for FusionConfig {
    fn from(settings: &FusionSettings) -> Self {
        Self {
            min_area_divisor: settings.min_area_divisor,
            max_area_divisor: settings.max_area_divisor,
            overlap_threshold: settings.overlap_threshold,
            collision_policy: settings.collision_policy,
        }
    }
}

impl From<FusionSettings> for FusionConfig {
    fn from(settings: FusionSettings) -> Self {
        (&settings).into()
    }
}

/// Inclusive area range a candidate must fall in to be considered at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeBounds {
    pub min_area: f64,
    pub max_area: f64,
}

impl SizeBounds {
    pub fn for_frame(frame: FrameSize, config: &FusionConfig) -> Self {
        let frame_area = frame.area() as f64;
        Self {
            min_area: frame_area / config.min_area_divisor,
            max_area: frame_area / config.max_area_divisor,
        }
    }

    pub fn admits(&self, rect: &Rect) -> bool {
        let area = rect.area() as f64;
        area >= self.min_area && area <= self.max_area
    }
}

/// Outcome of one fusion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fusion {
    /// Final detections in insertion order.
    pub detections: Vec<Rect>,
    /// Candidates rejected by the size filter.
    pub filtered_out: usize,
    /// Detections removed because a larger colliding candidate replaced them.
    pub displaced: usize,
    /// Candidates dropped because an existing detection was at least as large.
    pub absorbed: usize,
}

impl Fusion {
    /// Number of people found.
    pub fn count(&self) -> usize {
        self.detections.len()
    }
}

/// `true` when `a` and `b` overlap by more than `threshold` of the smaller area.
pub fn collides(a: &Rect, b: &Rect, threshold: f64) -> bool {
    let overlap = a.overlap_area(b) as f64;
    overlap > threshold * a.area().min(b.area()) as f64
}

/// Reduce aggregated candidates to the final detection set.
///
/// Candidates are visited once, in the order given. Each one is size-checked
/// against the frame and then compared with the detections kept so far; when
/// two collide the larger rectangle survives and ties favor the detection that
/// was kept first.
///
/// Rectangles are assumed to have positive sides.
pub fn fuse(candidates: &[Rect], frame: FrameSize, config: &FusionConfig) -> Fusion {
    let bounds = SizeBounds::for_frame(frame, config);
    let mut fusion = Fusion {
        detections: Vec::with_capacity(candidates.len()),
        ..Fusion::default()
    };

    for candidate in candidates {
        if !bounds.admits(candidate) {
            fusion.filtered_out += 1;
            continue;
        }
        let kept = match config.collision_policy {
            CollisionPolicy::FirstCollision => {
                resolve_first_collision(candidate, config.overlap_threshold, &mut fusion)
            }
            CollisionPolicy::Exhaustive => {
                resolve_all_collisions(candidate, config.overlap_threshold, &mut fusion)
            }
        };
        if kept {
            fusion.detections.push(*candidate);
        }
    }

    fusion
}

/// Settle only the first collision in scan order. Returns whether `candidate` is kept.
fn resolve_first_collision(candidate: &Rect, threshold: f64, fusion: &mut Fusion) -> bool {
    let hit = fusion
        .detections
        .iter()
        .position(|existing| collides(candidate, existing, threshold));

    let Some(index) = hit else {
        return true;
    };
    let existing = fusion.detections[index];
    if candidate.area() > existing.area() {
        trace!("{candidate:?} displaces {existing:?}");
        fusion.detections.remove(index);
        fusion.displaced += 1;
        true
    } else {
        trace!("{candidate:?} absorbed by {existing:?}");
        fusion.absorbed += 1;
        false
    }
}

/// Compare `candidate` with every detection. It is dropped if any colliding
/// detection is at least as large; otherwise all colliding detections go.
fn resolve_all_collisions(candidate: &Rect, threshold: f64, fusion: &mut Fusion) -> bool {
    let colliding: Vec<usize> = fusion
        .detections
        .iter()
        .enumerate()
        .filter(|(_, existing)| collides(candidate, existing, threshold))
        .map(|(index, _)| index)
        .collect();

    if colliding
        .iter()
        .any(|&index| fusion.detections[index].area() >= candidate.area())
    {
        trace!("{candidate:?} absorbed by an equal or larger detection");
        fusion.absorbed += 1;
        return false;
    }

    // Indices ascend, so removing from the back keeps the rest valid.
    for &index in colliding.iter().rev() {
        trace!("{candidate:?} displaces {:?}", fusion.detections[index]);
        fusion.detections.remove(index);
    }
    fusion.displaced += colliding.len();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: FrameSize = FrameSize::new(400, 400);

    fn exhaustive() -> FusionConfig {
        FusionConfig {
            collision_policy: CollisionPolicy::Exhaustive,
            ..FusionConfig::default()
        }
    }

    #[test]
    fn duplicate_candidates_collapse_to_one() {
        let candidates = [
            Rect::new(0, 0, 40, 40),
            Rect::new(0, 0, 40, 40),
            Rect::new(200, 200, 10, 10),
        ];
        let fusion = fuse(&candidates, FRAME, &FusionConfig::default());
        assert_eq!(fusion.detections, vec![Rect::new(0, 0, 40, 40)]);
        assert_eq!(fusion.count(), 1);
        assert_eq!(fusion.filtered_out, 1);
        assert_eq!(fusion.absorbed, 1);
        assert_eq!(fusion.displaced, 0);
    }

    #[test]
    fn size_bounds_are_inclusive() {
        let bounds = SizeBounds::for_frame(FRAME, &FusionConfig::default());
        assert_eq!(bounds.min_area, 400.0);
        assert_eq!(bounds.max_area, 40_000.0);
        assert!(bounds.admits(&Rect::new(0, 0, 20, 20)));
        assert!(!bounds.admits(&Rect::new(0, 0, 19, 21)));
        assert!(bounds.admits(&Rect::new(0, 0, 200, 200)));
        assert!(!bounds.admits(&Rect::new(0, 0, 201, 200)));
    }

    #[test]
    fn size_bounds_do_not_truncate() {
        // 301 * 301 / 400 = 226.5025, so a 226 px candidate is too small.
        let frame = FrameSize::new(301, 301);
        let bounds = SizeBounds::for_frame(frame, &FusionConfig::default());
        assert!(!bounds.admits(&Rect::new(0, 0, 226, 1)));
        assert!(bounds.admits(&Rect::new(0, 0, 227, 1)));
    }

    #[test]
    fn larger_candidate_replaces_contained_one() {
        let candidates = [Rect::new(10, 10, 30, 30), Rect::new(10, 10, 60, 60)];
        let fusion = fuse(&candidates, FRAME, &FusionConfig::default());
        assert_eq!(fusion.detections, vec![Rect::new(10, 10, 60, 60)]);
        assert_eq!(fusion.displaced, 1);
    }

    #[test]
    fn smaller_or_equal_candidate_is_absorbed() {
        let candidates = [Rect::new(10, 10, 60, 60), Rect::new(20, 20, 30, 30)];
        let fusion = fuse(&candidates, FRAME, &FusionConfig::default());
        assert_eq!(fusion.detections, vec![Rect::new(10, 10, 60, 60)]);

        // Equal areas: the one already kept wins.
        let candidates = [Rect::new(10, 10, 40, 40), Rect::new(14, 10, 40, 40)];
        let fusion = fuse(&candidates, FRAME, &FusionConfig::default());
        assert_eq!(fusion.detections, vec![Rect::new(10, 10, 40, 40)]);
    }

    #[test]
    fn threshold_is_strict() {
        // 30x30 boxes overlapping by 9x30 = 270 = exactly 0.3 * 900.
        let candidates = [Rect::new(0, 0, 30, 30), Rect::new(21, 0, 30, 30)];
        let fusion = fuse(&candidates, FRAME, &FusionConfig::default());
        assert_eq!(fusion.count(), 2);

        let candidates = [Rect::new(0, 0, 30, 30), Rect::new(20, 0, 30, 30)];
        let fusion = fuse(&candidates, FRAME, &FusionConfig::default());
        assert_eq!(fusion.count(), 1);
    }

    #[test]
    fn disjoint_candidates_pass_through_in_order() {
        let candidates = [
            Rect::new(300, 300, 50, 50),
            Rect::new(0, 0, 30, 30),
            Rect::new(100, 0, 25, 25),
            Rect::new(0, 0, 5, 5),
        ];
        let fusion = fuse(&candidates, FRAME, &FusionConfig::default());
        assert_eq!(fusion.detections, candidates[..3].to_vec());
    }

    #[test]
    fn displacement_moves_detection_to_the_end() {
        let candidates = [
            Rect::new(0, 0, 30, 30),
            Rect::new(200, 200, 30, 30),
            Rect::new(0, 0, 50, 50),
        ];
        let fusion = fuse(&candidates, FRAME, &FusionConfig::default());
        assert_eq!(
            fusion.detections,
            vec![Rect::new(200, 200, 30, 30), Rect::new(0, 0, 50, 50)]
        );
    }

    #[test]
    fn first_collision_policy_stops_after_one_resolution() {
        // The wide candidate collides with both kept boxes; only the first is
        // resolved, so the second survives next to it.
        let candidates = [
            Rect::new(0, 0, 30, 30),
            Rect::new(60, 0, 30, 30),
            Rect::new(0, 0, 90, 30),
        ];
        let fusion = fuse(&candidates, FRAME, &FusionConfig::default());
        assert_eq!(
            fusion.detections,
            vec![Rect::new(60, 0, 30, 30), Rect::new(0, 0, 90, 30)]
        );
        assert_eq!(fusion.displaced, 1);
    }

    #[test]
    fn exhaustive_policy_resolves_every_collision() {
        let candidates = [
            Rect::new(0, 0, 30, 30),
            Rect::new(60, 0, 30, 30),
            Rect::new(0, 0, 90, 30),
        ];
        let fusion = fuse(&candidates, FRAME, &exhaustive());
        assert_eq!(fusion.detections, vec![Rect::new(0, 0, 90, 30)]);
        assert_eq!(fusion.displaced, 2);
    }

    #[test]
    fn exhaustive_policy_keeps_everything_when_a_larger_detection_collides() {
        let candidates = [
            Rect::new(0, 0, 20, 30),
            Rect::new(60, 0, 100, 100),
            Rect::new(0, 0, 90, 30),
        ];
        let fusion = fuse(&candidates, FRAME, &exhaustive());
        assert_eq!(fusion.detections, candidates[..2].to_vec());
        assert_eq!(fusion.absorbed, 1);
        assert_eq!(fusion.displaced, 0);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let fusion = fuse(&[], FRAME, &FusionConfig::default());
        assert_eq!(fusion, Fusion::default());
    }

    #[test]
    fn converts_settings() {
        let settings = FusionSettings {
            overlap_threshold: 0.5,
            collision_policy: CollisionPolicy::Exhaustive,
            ..FusionSettings::default()
        };
        let config: FusionConfig = (&settings).into();
        assert_eq!(config.overlap_threshold, 0.5);
        assert_eq!(config.collision_policy, CollisionPolicy::Exhaustive);
        assert_eq!(config.min_area_divisor, 400.0);
    }
}
