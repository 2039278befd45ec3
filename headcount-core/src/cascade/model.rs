use super::integral::IntegralImages;

/// One weighted box of a Haar feature, in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WeightedRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HaarFeature {
    pub rects: Vec<WeightedRect>,
    pub tilted: bool,
}

impl HaarFeature {
    /// Raw (un-normalized) response of the feature for the window at `(wx, wy)`.
    #[inline]
    pub fn response(&self, ii: &IntegralImages, wx: usize, wy: usize) -> f64 {
        self.rects
            .iter()
            .map(|r| {
                let total = if self.tilted {
                    ii.tilted_sum(
                        wx as i64 + r.x as i64,
                        wy as i64 + r.y as i64,
                        r.width as i64,
                        r.height as i64,
                    )
                } else {
                    ii.rect_sum(
                        wx + r.x as usize,
                        wy + r.y as usize,
                        r.width as usize,
                        r.height as usize,
                    )
                };
                r.weight * total as f64
            })
            .sum()
    }
}

/// Decision-tree node. Positive children index `nodes`, non-positive ones
/// address `leaves[-child]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TreeNode {
    pub left: i32,
    pub right: i32,
    pub feature: usize,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WeakClassifier {
    pub nodes: Vec<TreeNode>,
    pub leaves: Vec<f64>,
}

impl WeakClassifier {
    #[inline]
    fn vote(&self, features: &[HaarFeature], window: &Window<'_>) -> f64 {
        let mut idx = 0i32;
        loop {
            let node = &self.nodes[idx as usize];
            let value = features[node.feature].response(window.ii, window.x, window.y)
                * window.norm_factor;
            idx = if value < node.threshold {
                node.left
            } else {
                node.right
            };
            if idx <= 0 {
                return self.leaves[(-idx) as usize];
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Stage {
    pub threshold: f64,
    pub classifiers: Vec<WeakClassifier>,
}

/// Outcome of running the cascade on one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Accepted,
    /// Rejected by the stage with this index.
    RejectedAt(usize),
    /// Window too uniform to normalize; never evaluated.
    Flat,
}

/// A window position on one pyramid level, with its variance normalization.
pub(crate) struct Window<'a> {
    ii: &'a IntegralImages,
    x: usize,
    y: usize,
    norm_factor: f64,
}

impl<'a> Window<'a> {
    /// Position a `win_w × win_h` window at `(x, y)`.
    ///
    /// Returns `None` for windows whose inner region has a standard deviation
    /// of 10 or less. The inner region excludes a one-pixel border.
    pub fn place(ii: &'a IntegralImages, x: usize, y: usize, win_w: usize, win_h: usize) -> Option<Self> {
        let (nw, nh) = (win_w - 2, win_h - 2);
        let area = (nw * nh) as f64;
        let sum = ii.rect_sum(x + 1, y + 1, nw, nh) as f64;
        let sqsum = ii.rect_sqsum(x + 1, y + 1, nw, nh) as f64;
        let nf = area * sqsum - sum * sum;
        if nf <= 0.0 {
            return None;
        }
        let norm_factor = 1.0 / nf.sqrt();
        if area * norm_factor >= 0.1 {
            return None;
        }
        Some(Self {
            ii,
            x,
            y,
            norm_factor,
        })
    }
}

/// Run every stage on `window`, stopping at the first one whose vote total
/// falls below its threshold.
pub(crate) fn classify(stages: &[Stage], features: &[HaarFeature], window: Option<&Window<'_>>) -> Verdict {
    let Some(window) = window else {
        return Verdict::Flat;
    };
    for (idx, stage) in stages.iter().enumerate() {
        let total: f64 = stage
            .classifiers
            .iter()
            .map(|weak| weak.vote(features, window))
            .sum();
        if total < stage.threshold {
            return Verdict::RejectedAt(idx);
        }
    }
    Verdict::Accepted
}
