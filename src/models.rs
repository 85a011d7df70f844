use std::collections::HashMap;
use std::fmt;

/// Axis-aligned box in source-image pixel coordinates, `x1 < x2`, `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }
}

/// One detected object. Owned by the enclosing [`PredictionResult`] and
/// never mutated after creation.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub class_id: usize,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1}%)", self.class_name, self.confidence * 100.0)
    }
}

/// Confidence statistics over the detections of a single class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassStats {
    pub count: usize,
    pub avg_confidence: f32,
    pub min_confidence: f32,
    pub max_confidence: f32,
}

/// Raw per-box output of the detection backend, before class names are
/// resolved. `bbox` is `(x1, y1, x2, y2)` in source pixels.
#[derive(Debug, Clone, Copy)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: (i32, i32, i32, i32),
}

/// Everything one inference call produced: the detections in the order the
/// detector emitted them, the source image shape and the wall-clock time.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub detections: Vec<DetectionResult>,
    /// Source image `(width, height)`.
    pub image_shape: (u32, u32),
    /// Inference wall time in milliseconds.
    pub inference_time_ms: f64,
}

impl PredictionResult {
    /// Builds a result from raw backend tuples, resolving class names through
    /// the lookup. Ids without a name become `class_{id}`; emission order is
    /// preserved.
    pub fn from_raw(
        raw: Vec<RawDetection>,
        names: &HashMap<usize, String>,
        image_shape: (u32, u32),
        inference_time_ms: f64,
    ) -> Self {
        let detections = raw
            .into_iter()
            .map(|d| DetectionResult {
                class_id: d.class_id,
                class_name: names
                    .get(&d.class_id)
                    .cloned()
                    .unwrap_or_else(|| format!("class_{}", d.class_id)),
                confidence: d.confidence,
                bbox: BoundingBox::new(d.bbox.0, d.bbox.1, d.bbox.2, d.bbox.3),
            })
            .collect();

        Self {
            detections,
            image_shape,
            inference_time_ms,
        }
    }

    pub fn count(&self) -> usize {
        self.detections.len()
    }

    /// Groups detections by class name in first-seen order. This is the
    /// detector's emission order, deliberately distinct from the alphabetical
    /// ordering of the textual summary; both views are kept.
    pub fn detections_by_class(&self) -> Vec<(String, Vec<&DetectionResult>)> {
        let mut grouped: Vec<(String, Vec<&DetectionResult>)> = Vec::new();

        for detection in &self.detections {
            match grouped
                .iter_mut()
                .find(|(name, _)| *name == detection.class_name)
            {
                Some((_, group)) => group.push(detection),
                None => grouped.push((detection.class_name.clone(), vec![detection])),
            }
        }

        grouped
    }

    /// Per-class confidence statistics, in the same first-seen order as
    /// [`detections_by_class`](Self::detections_by_class). Empty when there
    /// are no detections; a group always holds at least one detection, so
    /// the averages are well defined.
    pub fn class_statistics(&self) -> Vec<(String, ClassStats)> {
        self.detections_by_class()
            .into_iter()
            .map(|(name, group)| {
                let confidences: Vec<f32> = group.iter().map(|d| d.confidence).collect();
                let sum: f32 = confidences.iter().sum();
                let stats = ClassStats {
                    count: confidences.len(),
                    avg_confidence: sum / confidences.len() as f32,
                    min_confidence: confidences.iter().copied().fold(f32::INFINITY, f32::min),
                    max_confidence: confidences
                        .iter()
                        .copied()
                        .fold(f32::NEG_INFINITY, f32::max),
                };
                (name, stats)
            })
            .collect()
    }
}

/// Validation metrics reported by the detection library; opaque numbers as
/// far as this crate is concerned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationMetrics {
    pub map50: f64,
    pub precision: f64,
    pub recall: f64,
    pub map50_95: f64,
}

/// Image counts of the two dataset splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetStats {
    pub train_images: usize,
    pub valid_images: usize,
}
