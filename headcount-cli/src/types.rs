//! Serializable records for the batch summary written with `--json`.

use std::path::Path;

use headcount_core::{CountOutput, Rect};
use serde::Serialize;

/// A single fused detection.
#[derive(Debug, Serialize)]
pub struct DetectionRecord {
    /// `[x, y, width, height]` in source pixels.
    pub bbox: [i32; 4],
    pub center: [i32; 2],
}

impl From<&Rect> for DetectionRecord {
    fn from(rect: &Rect) -> Self {
        let (cx, cy) = rect.center();
        Self {
            bbox: [rect.x, rect.y, rect.width, rect.height],
            center: [cx, cy],
        }
    }
}

/// Count and bookkeeping for one image of the batch.
#[derive(Debug, Serialize)]
pub struct ImageCount {
    pub image: String,
    pub count: usize,
    pub detections: Vec<DetectionRecord>,
    /// Candidates entering fusion, before size filtering.
    pub candidates: usize,
    pub filtered_out: usize,
    pub displaced: usize,
    pub absorbed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageCount {
    pub fn from_output(image: &Path, output: &CountOutput) -> Self {
        Self {
            image: image.display().to_string(),
            count: output.count(),
            detections: output.detections.iter().map(DetectionRecord::from).collect(),
            candidates: output.candidates.len(),
            filtered_out: output.stats.filtered_out,
            displaced: output.stats.displaced,
            absorbed: output.stats.absorbed,
            annotated: None,
            error: None,
        }
    }

    /// Entry for an image that could not be processed; it counts as zero.
    pub fn failed(image: &Path, error: &anyhow::Error) -> Self {
        Self {
            image: image.display().to_string(),
            count: 0,
            detections: Vec::new(),
            candidates: 0,
            filtered_out: 0,
            displaced: 0,
            absorbed: 0,
            annotated: None,
            error: Some(format!("{error:#}")),
        }
    }
}

/// Whole-run summary.
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub input_dir: String,
    pub processed: usize,
    pub failed: usize,
    pub total_people: usize,
    pub collision_policy: String,
    pub images: Vec<ImageCount>,
}

impl BatchSummary {
    pub fn new(input_dir: &Path, collision_policy: impl ToString) -> Self {
        Self {
            input_dir: input_dir.display().to_string(),
            processed: 0,
            failed: 0,
            total_people: 0,
            collision_policy: collision_policy.to_string(),
            images: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: ImageCount) {
        if entry.error.is_some() {
            self.failed += 1;
        } else {
            self.processed += 1;
            self.total_people += entry.count;
        }
        self.images.push(entry);
    }
}
