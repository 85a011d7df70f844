use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// One RGB color used for box drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// YOLO model hyperparameters. Immutable after construction; validated
/// through [`ModelConfig::validate`] before the application starts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base weights to start training from.
    pub name: String,
    pub epochs: u32,
    pub image_size: u32,
    pub batch_size: u32,
    pub device: u32,
    pub workers: u32,
    pub cache: bool,
    pub patience: u32,
    pub confidence_threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "yolov8n.pt".to_string(),
            epochs: 20,
            image_size: 640,
            batch_size: 64,
            device: 0,
            workers: 8,
            cache: true,
            patience: 8,
            confidence_threshold: 0.4,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs < 1 {
            return Err(Error::ConfigValidation(
                "epochs must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::ConfigValidation(format!(
                "confidence threshold must be between 0 and 1, got {}",
                self.confidence_threshold
            )));
        }
        Ok(())
    }
}

/// Which images get picked for the validation split.
///
/// The original behavior takes the front of the directory listing as the
/// filesystem returns it, which is not guaranteed to be stable across
/// filesystems. `Sorted` trades that nondeterminism for a lexicographic
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitOrder {
    #[default]
    Directory,
    Sorted,
}

/// Dataset locations and the Roboflow coordinates used to fetch it.
/// All concrete paths are derived from `base_path`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub base_path: PathBuf,
    pub augmented_path: PathBuf,
    pub validation_split: f32,
    pub min_validation_samples: usize,
    pub split_order: SplitOrder,

    pub api_key: String,
    pub workspace: String,
    pub project: String,
    pub version: u32,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("datasets/ppe"),
            augmented_path: PathBuf::from("datasets/ppe_augmented"),
            validation_split: 0.2,
            min_validation_samples: 10,
            split_order: SplitOrder::Directory,
            api_key: String::new(),
            workspace: "joseph-nelson".to_string(),
            project: "hard-hat-workers".to_string(),
            version: 2,
        }
    }
}

impl DatasetConfig {
    pub fn train_images_path(&self) -> PathBuf {
        self.base_path.join("train").join("images")
    }

    pub fn train_labels_path(&self) -> PathBuf {
        self.base_path.join("train").join("labels")
    }

    pub fn valid_images_path(&self) -> PathBuf {
        self.base_path.join("valid").join("images")
    }

    pub fn valid_labels_path(&self) -> PathBuf {
        self.base_path.join("valid").join("labels")
    }

    /// Manifest consumed by the detection library; its content is owned by
    /// the dataset export, we only pass the path around.
    pub fn data_yaml_path(&self) -> PathBuf {
        self.base_path.join("data.yaml")
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(Error::ConfigValidation(format!(
                "validation split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        Ok(())
    }
}

/// Box and label styling for annotated output images.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub colors: Vec<Color>,
    pub box_thickness: u32,
    pub font_scale: f32,
    pub font_thickness: u32,
    pub label_padding: u32,
    pub label_height: u32,
    /// TTF file used for label text; labels fall back to plain plates when
    /// no font is configured.
    pub font_path: Option<PathBuf>,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            colors: vec![
                Color::new(255, 0, 0),
                Color::new(0, 255, 0),
                Color::new(255, 165, 0),
                Color::new(255, 255, 0),
                Color::new(255, 0, 255),
                Color::new(0, 255, 255),
                Color::new(128, 0, 128),
                Color::new(0, 128, 0),
                Color::new(0, 0, 255),
                Color::new(128, 128, 128),
            ],
            box_thickness: 3,
            font_scale: 0.6,
            font_thickness: 2,
            label_padding: 10,
            label_height: 25,
            font_path: None,
        }
    }
}

impl VisualizationConfig {
    /// Deterministic color for a class, wrapping for ids beyond the palette.
    pub fn color_for(&self, class_id: usize) -> Color {
        self.colors[class_id % self.colors.len()]
    }

    pub fn validate(&self) -> Result<()> {
        if self.colors.is_empty() {
            return Err(Error::ConfigValidation(
                "visualization needs at least one color".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level application configuration, composed of the three sections and
/// constructed once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub save_dir: PathBuf,
    pub project_name: String,

    pub model: ModelConfig,
    pub dataset: DatasetConfig,
    pub visualization: VisualizationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("runs"),
            project_name: "ppe_model".to_string(),
            model: ModelConfig::default(),
            dataset: DatasetConfig::default(),
            visualization: VisualizationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Directory the training run writes into.
    pub fn model_save_path(&self) -> PathBuf {
        self.save_dir.join(&self.project_name)
    }

    /// Exported weights of the best epoch.
    pub fn best_model_path(&self) -> PathBuf {
        self.model_save_path().join("weights").join("best.onnx")
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.dataset.validate()?;
        self.visualization.validate()?;
        Ok(())
    }

    /// Loads and validates a YAML config file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::ConfigValidation(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }
}

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AppConfig:")?;
        writeln!(f, "  Save Dir: {}", self.save_dir.display())?;
        writeln!(f, "  Project: {}", self.project_name)?;
        writeln!(f, "  Model: {}", self.model.name)?;
        write!(f, "  Dataset: {}", self.dataset.base_path.display())
    }
}
