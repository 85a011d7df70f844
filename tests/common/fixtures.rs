use std::fs;
use std::path::PathBuf;

use ppe_detect::config::DatasetConfig;
use ppe_detect::models::{BoundingBox, DetectionResult, PredictionResult};
use tempfile::TempDir;

/// Creates a dataset tree under a temp directory with `train_images` jpg
/// files in `train/images` and a matching label for each in `train/labels`.
/// Returns the temp dir (keep alive) and a config rooted at it.
pub fn make_train_dataset(train_images: usize) -> (TempDir, DatasetConfig) {
    let dir = TempDir::new().expect("failed to create temp dataset dir");
    let config = DatasetConfig {
        base_path: dir.path().to_path_buf(),
        ..DatasetConfig::default()
    };

    fs::create_dir_all(config.train_images_path()).expect("failed to create train/images");
    fs::create_dir_all(config.train_labels_path()).expect("failed to create train/labels");

    for i in 0..train_images {
        write_image(&config.train_images_path(), &format!("img_{i:03}"));
        write_label(&config.train_labels_path(), &format!("img_{i:03}"));
    }

    (dir, config)
}

pub fn write_image(dir: &PathBuf, stem: &str) {
    fs::write(dir.join(format!("{stem}.jpg")), b"jpg").expect("failed to write image file");
}

pub fn write_label(dir: &PathBuf, stem: &str) {
    fs::write(dir.join(format!("{stem}.txt")), b"0 0.5 0.5 0.1 0.1")
        .expect("failed to write label file");
}

pub fn count_files(dir: &PathBuf) -> usize {
    match fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

pub fn detection(class_id: usize, name: &str, confidence: f32) -> DetectionResult {
    DetectionResult {
        class_id,
        class_name: name.to_string(),
        confidence,
        bbox: BoundingBox::new(10, 20, 100, 200),
    }
}

pub fn prediction(detections: Vec<DetectionResult>) -> PredictionResult {
    PredictionResult {
        detections,
        image_shape: (640, 480),
        inference_time_ms: 15.5,
    }
}
