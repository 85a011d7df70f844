use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, ArrayViewD, Axis, IxDyn, s};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::RawDetection;

use super::backend::ModelBackend;

const IOU_THRESHOLD: f32 = 0.45;
const MAX_DETECTIONS: usize = 300;

/// ONNX Runtime implementation of [`ModelBackend`] for YOLOv8 detection
/// exports with a `[1, 4 + classes, candidates]` output head.
pub struct OnnxBackend {
    image_size: u32,
    intra_threads: usize,
    session: Option<Session>,
    class_names: HashMap<usize, String>,
}

impl OnnxBackend {
    pub fn new(image_size: u32, intra_threads: usize) -> Self {
        Self {
            image_size,
            intra_threads,
            session: None,
            class_names: HashMap::new(),
        }
    }
}

impl ModelBackend for OnnxBackend {
    fn load(&mut self, path: &Path) -> Result<()> {
        let builder = Session::builder()
            .map_err(|e| Error::Inference(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::Inference(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(self.intra_threads)
            .map_err(|e| Error::Inference(format!("failed to set thread count: {e}")))?;

        let model_bytes = fs::read(path)?;
        let session = builder
            .commit_from_memory(&model_bytes)
            .map_err(|e| Error::Inference(format!("failed to load model: {e}")))?;

        self.class_names = extract_class_names(&session);
        info!(
            classes = self.class_names.len(),
            "model loaded from {}",
            path.display()
        );
        self.session = Some(session);
        Ok(())
    }

    fn class_names(&self) -> &HashMap<usize, String> {
        &self.class_names
    }

    fn predict_raw(&mut self, image: &DynamicImage, confidence: f32) -> Result<Vec<RawDetection>> {
        let session = self.session.as_mut().ok_or(Error::ModelNotLoaded)?;

        let imgsz = self.image_size as usize;
        let rgb = image.to_rgb8();
        let resized =
            image::imageops::resize(&rgb, imgsz as u32, imgsz as u32, FilterType::Nearest);

        let mut input = Array4::<f32>::zeros((1, 3, imgsz, imgsz));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }

        let input_shape = vec![1_i64, 3, imgsz as i64, imgsz as i64];
        let (input_data, _) = input.into_raw_vec_and_offset();
        let input_tensor = Value::from_array((input_shape, input_data))
            .map_err(|e| Error::Inference(format!("failed to build input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| Error::Inference(format!("inference run failed: {e}")))?;
        let (output_shape, output_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Inference(format!("failed to extract output: {e}")))?;

        let dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();
        let output = ArrayViewD::from_shape(IxDyn(&dims), output_data)
            .map_err(|e| Error::Inference(format!("unexpected output shape: {e}")))?;
        let view = output.index_axis(Axis(0), 0);

        let num_candidates = view.shape()[1];
        let sx = image.width() as f32 / imgsz as f32;
        let sy = image.height() as f32 / imgsz as f32;

        let mut detections = Vec::new();
        for i in 0..num_candidates {
            let scores = view.slice(s![4.., i]);
            let Some((class_id, &max_score)) = scores
                .indexed_iter()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            else {
                continue;
            };

            if max_score < confidence {
                continue;
            }

            let cx = view[[0, i]];
            let cy = view[[1, i]];
            let w = view[[2, i]];
            let h = view[[3, i]];

            let max_x = image.width() as i32 - 1;
            let max_y = image.height() as i32 - 1;
            let x1 = (((cx - w / 2.0) * sx) as i32).clamp(0, max_x);
            let y1 = (((cy - h / 2.0) * sy) as i32).clamp(0, max_y);
            let x2 = (((cx + w / 2.0) * sx) as i32).clamp(0, max_x);
            let y2 = (((cy + h / 2.0) * sy) as i32).clamp(0, max_y);
            if x1 >= x2 || y1 >= y2 {
                continue;
            }

            detections.push(RawDetection {
                class_id,
                confidence: max_score,
                bbox: (x1, y1, x2, y2),
            });
        }

        debug!(candidates = detections.len(), "candidates above threshold");
        let mut kept = non_max_suppression(detections, IOU_THRESHOLD);
        kept.truncate(MAX_DETECTIONS);
        Ok(kept)
    }
}

/// Reads the ultralytics `names` metadata entry, a python-style mapping like
/// `{0: 'head', 1: 'helmet'}`. Models without it get an empty map and the
/// aggregation falls back to `class_{id}` names.
fn extract_class_names(session: &Session) -> HashMap<usize, String> {
    let Ok(metadata) = session.metadata() else {
        return HashMap::new();
    };
    match metadata.custom("names") {
        Ok(Some(names)) => parse_names(&names),
        _ => HashMap::new(),
    }
}

fn parse_names(raw: &str) -> HashMap<usize, String> {
    let mut names = HashMap::new();
    let inner = raw.trim().trim_start_matches('{').trim_end_matches('}');

    for part in inner.split(',') {
        let Some((id, name)) = part.split_once(':') else {
            continue;
        };
        let Ok(id) = id.trim().parse::<usize>() else {
            continue;
        };
        let name = name.trim().trim_matches(|c| c == '\'' || c == '"').to_string();
        if !name.is_empty() {
            names.insert(id, name);
        }
    }

    names
}

/// Greedy per-class NMS over confidence-sorted boxes.
fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_unstable_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<RawDetection> = Vec::new();
    'candidates: for detection in detections {
        for winner in &kept {
            if winner.class_id == detection.class_id
                && iou(winner.bbox, detection.bbox) > iou_threshold
            {
                continue 'candidates;
            }
        }
        kept.push(detection);
    }
    kept
}

fn iou(a: (i32, i32, i32, i32), b: (i32, i32, i32, i32)) -> f32 {
    let ix1 = a.0.max(b.0);
    let iy1 = a.1.max(b.1);
    let ix2 = a.2.min(b.2);
    let iy2 = a.3.min(b.3);

    let intersection = ((ix2 - ix1).max(0) as f32) * ((iy2 - iy1).max(0) as f32);
    let area_a = ((a.2 - a.0) as f32) * ((a.3 - a.1) as f32);
    let area_b = ((b.2 - b.0) as f32) * ((b.3 - b.1) as f32);
    let union = area_a + area_b - intersection;

    if union <= 0.0 { 0.0 } else { intersection / union }
}
