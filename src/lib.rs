pub mod app;
pub mod config;
pub mod dataset;
pub mod detection;
pub mod error;
pub mod models;
pub mod visualizer;

#[cfg(feature = "ui")]
pub mod ui;

pub use app::PpeApp;
pub use config::{AppConfig, DatasetConfig, ModelConfig, SplitOrder, VisualizationConfig};
pub use dataset::{DatasetManager, DatasetSource, RoboflowSource};
pub use detection::{ModelBackend, ModelTrainer, PpeDetector};
pub use error::{Error, Result};
pub use models::{
    BoundingBox, ClassStats, DatasetStats, DetectionResult, PredictionResult, RawDetection,
    ValidationMetrics,
};
pub use visualizer::Visualizer;
