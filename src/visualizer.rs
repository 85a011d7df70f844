use std::fs;

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::config::VisualizationConfig;
use crate::error::{Error, Result};
use crate::models::{DetectionResult, PredictionResult};

/// Base pixel height that `font_scale` multiplies into.
const FONT_BASE_PX: f32 = 32.0;

/// Renders detections onto image buffers and produces the textual summary.
pub struct Visualizer {
    config: VisualizationConfig,
    font: Option<FontVec>,
}

impl Visualizer {
    /// Builds a visualizer, loading the label font when one is configured.
    /// Without a font, label plates are drawn without text.
    pub fn new(config: VisualizationConfig) -> Result<Self> {
        let font = match &config.font_path {
            Some(path) => {
                let bytes = fs::read(path)?;
                let font = FontVec::try_from_vec(bytes).map_err(|e| {
                    Error::ConfigValidation(format!("invalid font file {}: {e}", path.display()))
                })?;
                Some(font)
            }
            None => None,
        };

        Ok(Self { config, font })
    }

    pub fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    /// Returns a copy of the image with one rectangle per detection, colored
    /// by class, plus an optional label plate above each box.
    pub fn annotate(
        &self,
        image: &DynamicImage,
        prediction: &PredictionResult,
        show_labels: bool,
        show_confidence: bool,
    ) -> RgbImage {
        let mut annotated = image.to_rgb8();
        for detection in &prediction.detections {
            self.draw_detection(&mut annotated, detection, show_labels, show_confidence);
        }
        annotated
    }

    fn draw_detection(
        &self,
        image: &mut RgbImage,
        detection: &DetectionResult,
        show_labels: bool,
        show_confidence: bool,
    ) {
        let color = self.config.color_for(detection.class_id);
        let rgb = Rgb([color.r, color.g, color.b]);
        let bbox = detection.bbox;

        // Concentric hollow rectangles give the configured line thickness;
        // imageproc clips anything that leaves the canvas.
        for t in 0..self.config.box_thickness as i32 {
            let width = bbox.width() as i32 - 2 * t;
            let height = bbox.height() as i32 - 2 * t;
            if width <= 0 || height <= 0 {
                break;
            }
            let rect =
                Rect::at(bbox.x1 + t, bbox.y1 + t).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(image, rect, rgb);
        }

        if show_labels || show_confidence {
            self.draw_label(image, detection, rgb, show_labels, show_confidence);
        }
    }

    fn draw_label(
        &self,
        image: &mut RgbImage,
        detection: &DetectionResult,
        color: Rgb<u8>,
        show_name: bool,
        show_conf: bool,
    ) {
        let mut parts = Vec::new();
        if show_name {
            parts.push(detection.class_name.clone());
        }
        if show_conf {
            parts.push(format!("{:.0}%", detection.confidence * 100.0));
        }
        let text = parts.join(" ");
        if text.is_empty() {
            return;
        }

        let scale = PxScale::from(self.config.font_scale * FONT_BASE_PX);
        let text_width = match &self.font {
            Some(font) => text_size(scale, font, &text).0 as i32,
            // Rough monospace estimate keeps plate sizes sane without a font.
            None => text.len() as i32 * (self.config.font_scale * FONT_BASE_PX / 2.0) as i32,
        };

        let plate_top = detection.bbox.y1 - self.config.label_height as i32;
        let plate = Rect::at(detection.bbox.x1, plate_top).of_size(
            (text_width + self.config.label_padding as i32).max(1) as u32,
            self.config.label_height,
        );
        draw_filled_rect_mut(image, plate, color);

        if let Some(font) = &self.font {
            draw_text_mut(
                image,
                Rgb([255, 255, 255]),
                detection.bbox.x1 + 5,
                plate_top + 4,
                scale,
                font,
                &text,
            );
        }
    }

    /// One-line-per-class summary, sorted alphabetically by class name. The
    /// grouping views on [`PredictionResult`] keep first-seen order; only
    /// this rendering sorts.
    pub fn summary_text(&self, prediction: &PredictionResult, confidence_threshold: f32) -> String {
        let mut lines = vec![
            format!("Confiança mínima: {:.0}%", confidence_threshold * 100.0),
            format!("Detecções: {}", prediction.count()),
            String::new(),
        ];

        if prediction.count() > 0 {
            lines.push("Por classe:".to_string());
            let mut stats = prediction.class_statistics();
            stats.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, class_stats) in stats {
                lines.push(format!(
                    "  {}: {}x (média: {:.1}%)",
                    name,
                    class_stats.count,
                    class_stats.avg_confidence * 100.0
                ));
            }
        } else {
            lines.push("Nenhuma detecção".to_string());
        }

        lines.join("\n")
    }
}
