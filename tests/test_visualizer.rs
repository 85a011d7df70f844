mod common;

use common::fixtures::*;
use image::{DynamicImage, Rgb, RgbImage};
use ppe_detect::Visualizer;
use ppe_detect::config::VisualizationConfig;
use ppe_detect::models::{BoundingBox, DetectionResult};

fn visualizer() -> Visualizer {
    Visualizer::new(VisualizationConfig::default()).unwrap()
}

fn black_canvas(size: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::new(size, size))
}

fn det_at(class_id: usize, name: &str, bbox: (i32, i32, i32, i32)) -> DetectionResult {
    DetectionResult {
        class_id,
        class_name: name.to_string(),
        confidence: 0.9,
        bbox: BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3),
    }
}

#[test]
fn summary_sorts_classes_alphabetically() {
    let result = prediction(vec![
        detection(2, "person", 0.8),
        detection(0, "helmet", 0.9),
        detection(1, "head", 0.7),
    ]);

    let text = visualizer().summary_text(&result, 0.4);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "Confiança mínima: 40%");
    assert_eq!(lines[1], "Detecções: 3");
    assert_eq!(lines[3], "Por classe:");
    assert_eq!(lines[4], "  head: 1x (média: 70.0%)");
    assert_eq!(lines[5], "  helmet: 1x (média: 90.0%)");
    assert_eq!(lines[6], "  person: 1x (média: 80.0%)");
}

#[test]
fn summary_averages_within_a_class() {
    let result = prediction(vec![
        detection(0, "helmet", 0.9),
        detection(0, "helmet", 0.8),
    ]);

    let text = visualizer().summary_text(&result, 0.4);
    assert!(text.contains("  helmet: 2x (média: 85.0%)"));
}

#[test]
fn summary_without_detections() {
    let text = visualizer().summary_text(&prediction(Vec::new()), 0.4);

    assert!(text.contains("Detecções: 0"));
    assert!(text.contains("Nenhuma detecção"));
    assert!(!text.contains("Por classe:"));
}

#[test]
fn annotate_draws_class_colored_borders() {
    let result = prediction(vec![det_at(0, "helmet", (10, 10, 50, 50))]);

    let annotated = visualizer().annotate(&black_canvas(100), &result, false, false);

    // Class 0 maps to the first palette entry (red).
    assert_eq!(*annotated.get_pixel(10, 10), Rgb([255, 0, 0]));
    assert_eq!(*annotated.get_pixel(50, 30), Rgb([255, 0, 0]));
    // Interior and exterior stay untouched.
    assert_eq!(*annotated.get_pixel(30, 30), Rgb([0, 0, 0]));
    assert_eq!(*annotated.get_pixel(70, 70), Rgb([0, 0, 0]));
}

#[test]
fn annotate_without_labels_leaves_area_above_box_empty() {
    let result = prediction(vec![det_at(0, "helmet", (20, 40, 80, 90))]);

    let annotated = visualizer().annotate(&black_canvas(100), &result, false, false);

    assert_eq!(*annotated.get_pixel(22, 20), Rgb([0, 0, 0]));
}

#[test]
fn annotate_with_labels_fills_a_plate_above_the_box() {
    let result = prediction(vec![det_at(0, "helmet", (20, 40, 80, 90))]);

    let annotated = visualizer().annotate(&black_canvas(100), &result, true, false);

    // Default label height is 25, so the plate spans y 15..40 from x 20.
    assert_eq!(*annotated.get_pixel(22, 20), Rgb([255, 0, 0]));
    assert_eq!(*annotated.get_pixel(22, 38), Rgb([255, 0, 0]));
}

#[test]
fn palette_wraps_for_high_class_ids() {
    let result = prediction(vec![det_at(12, "vest", (10, 10, 50, 50))]);

    let annotated = visualizer().annotate(&black_canvas(100), &result, false, false);

    // 12 % 10 picks the third palette entry (orange).
    assert_eq!(*annotated.get_pixel(10, 10), Rgb([255, 165, 0]));
}

#[test]
fn annotate_does_not_mutate_the_input() {
    let canvas = black_canvas(100);
    let result = prediction(vec![det_at(0, "helmet", (10, 10, 50, 50))]);

    let _ = visualizer().annotate(&canvas, &result, true, true);

    assert_eq!(*canvas.to_rgb8().get_pixel(10, 10), Rgb([0, 0, 0]));
}
