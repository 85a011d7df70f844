pub mod backend;
pub mod onnx;
pub mod trainer;

pub use backend::ModelBackend;
pub use onnx::OnnxBackend;
pub use trainer::{ModelTrainer, UltralyticsCli};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::DynamicImage;
use tracing::info;

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::models::{PredictionResult, ValidationMetrics};

/// Facade over the external detection collaborators.
///
/// Starts unloaded; `load_model` or `train` moves it to the loaded state, and
/// every predict/validate/test call before that fails with
/// [`Error::ModelNotLoaded`]. Prediction has no side effect beyond the call
/// duration timer.
pub struct PpeDetector {
    config: ModelConfig,
    backend: Box<dyn ModelBackend>,
    trainer: Box<dyn ModelTrainer>,
    model_path: Option<PathBuf>,
}

impl PpeDetector {
    pub fn new(
        config: ModelConfig,
        backend: Box<dyn ModelBackend>,
        trainer: Box<dyn ModelTrainer>,
    ) -> Self {
        Self {
            config,
            backend,
            trainer,
            model_path: None,
        }
    }

    /// Detector with the production collaborators: ONNX Runtime inference and
    /// the ultralytics command line for training/validation.
    pub fn with_onnx(config: ModelConfig) -> Self {
        let backend = OnnxBackend::new(config.image_size, config.workers as usize);
        Self::new(config, Box::new(backend), Box::new(UltralyticsCli::new()))
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.model_path.is_some()
    }

    pub fn class_names(&self) -> &HashMap<usize, String> {
        self.backend.class_names()
    }

    fn require_loaded(&self) -> Result<&Path> {
        self.model_path.as_deref().ok_or(Error::ModelNotLoaded)
    }

    /// Loads trained weights from disk.
    pub fn load_model(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(Error::ModelNotFound(path.to_path_buf()));
        }

        self.backend.load(path)?;
        self.model_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Trains on the manifest and loads the produced weights.
    pub fn train(&mut self, data_yaml: &Path, project_dir: &Path, run_name: &str) -> Result<()> {
        let weights = self
            .trainer
            .train(&self.config, data_yaml, project_dir, run_name)?;
        info!("training finished, weights at {}", weights.display());
        self.load_model(&weights)
    }

    /// Runs detection on one image. The per-call confidence overrides the
    /// configured default when given.
    pub fn predict(
        &mut self,
        image: &DynamicImage,
        confidence: Option<f32>,
    ) -> Result<PredictionResult> {
        self.require_loaded()?;
        let threshold = confidence.unwrap_or(self.config.confidence_threshold);

        let started = Instant::now();
        let raw = self.backend.predict_raw(image, threshold)?;
        let inference_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        Ok(PredictionResult::from_raw(
            raw,
            self.backend.class_names(),
            (image.width(), image.height()),
            inference_time_ms,
        ))
    }

    /// Validates the loaded model on the manifest's validation split.
    pub fn validate(&mut self, data_yaml: &Path) -> Result<ValidationMetrics> {
        let model_path = self.require_loaded()?.to_path_buf();

        info!("validating model");
        let metrics = self.trainer.validate(&model_path, data_yaml)?;
        info!(
            "mAP50: {:.1}%  precision: {:.1}%  recall: {:.1}%",
            metrics.map50 * 100.0,
            metrics.precision * 100.0,
            metrics.recall * 100.0
        );
        Ok(metrics)
    }

    /// Smoke-tests inference on a single image file, logging up to five
    /// detections.
    pub fn test_inference(&mut self, image_path: &Path) -> Result<PredictionResult> {
        self.require_loaded()?;

        info!("testing inference on {}", image_path.display());
        let image = image::open(image_path).map_err(|e| {
            Error::Inference(format!("failed to load {}: {e}", image_path.display()))
        })?;

        let result = self.predict(&image, None)?;
        info!(count = result.count(), "detections");
        for detection in result.detections.iter().take(5) {
            info!("  - {detection}");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawDetection;

    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockBackend {
        names: HashMap<usize, String>,
        last_confidence: Arc<Mutex<f32>>,
        raw: Vec<RawDetection>,
    }

    impl ModelBackend for MockBackend {
        fn load(&mut self, _path: &Path) -> Result<()> {
            self.names.insert(0, "helmet".to_string());
            Ok(())
        }

        fn class_names(&self) -> &HashMap<usize, String> {
            &self.names
        }

        fn predict_raw(
            &mut self,
            _image: &DynamicImage,
            confidence: f32,
        ) -> Result<Vec<RawDetection>> {
            *self.last_confidence.lock().unwrap() = confidence;
            Ok(self.raw.clone())
        }
    }

    struct MockTrainer;

    impl ModelTrainer for MockTrainer {
        fn train(
            &self,
            _config: &ModelConfig,
            _data_yaml: &Path,
            project_dir: &Path,
            run_name: &str,
        ) -> Result<PathBuf> {
            let weights = project_dir.join(run_name).join("weights");
            std::fs::create_dir_all(&weights)?;
            let best = weights.join("best.onnx");
            std::fs::write(&best, b"weights")?;
            Ok(best)
        }

        fn validate(&self, _model_path: &Path, _data_yaml: &Path) -> Result<ValidationMetrics> {
            Ok(ValidationMetrics {
                map50: 0.95,
                precision: 0.9,
                recall: 0.85,
                map50_95: 0.6,
            })
        }
    }

    fn detector() -> PpeDetector {
        PpeDetector::new(
            ModelConfig::default(),
            Box::new(MockBackend::default()),
            Box::new(MockTrainer),
        )
    }

    fn blank_image() -> DynamicImage {
        DynamicImage::new_rgb8(64, 64)
    }

    #[test]
    fn predict_fails_while_unloaded() {
        let mut detector = detector();
        let result = detector.predict(&blank_image(), None);
        assert!(matches!(result, Err(Error::ModelNotLoaded)));
    }

    #[test]
    fn validate_fails_while_unloaded() {
        let mut detector = detector();
        let result = detector.validate(Path::new("data.yaml"));
        assert!(matches!(result, Err(Error::ModelNotLoaded)));
    }

    #[test]
    fn load_missing_file_fails() {
        let mut detector = detector();
        let result = detector.load_model(Path::new("does/not/exist.onnx"));
        assert!(matches!(result, Err(Error::ModelNotFound(_))));
    }

    #[test]
    fn predict_threshold_defaults_and_overrides() {
        let weights = tempfile::NamedTempFile::new().unwrap();
        let seen = Arc::new(Mutex::new(0.0_f32));
        let backend = MockBackend {
            last_confidence: Arc::clone(&seen),
            ..MockBackend::default()
        };
        let mut detector =
            PpeDetector::new(ModelConfig::default(), Box::new(backend), Box::new(MockTrainer));
        detector.load_model(weights.path()).unwrap();

        detector.predict(&blank_image(), None).unwrap();
        assert_eq!(*seen.lock().unwrap(), detector.config().confidence_threshold);

        detector.predict(&blank_image(), Some(0.9)).unwrap();
        assert_eq!(*seen.lock().unwrap(), 0.9);
    }

    #[test]
    fn detector_is_send_for_the_shared_web_state() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<PpeDetector>();
        // The web handlers hold the detector behind Arc<Mutex<_>>.
        assert_sync::<std::sync::Mutex<PpeDetector>>();
    }

    #[test]
    fn train_leaves_the_detector_loaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut detector = detector();
        assert!(!detector.is_loaded());

        detector
            .train(Path::new("data.yaml"), dir.path(), "run")
            .unwrap();
        assert!(detector.is_loaded());
        assert_eq!(detector.class_names()[&0], "helmet");
    }

    #[test]
    fn validate_returns_collaborator_metrics() {
        let weights = tempfile::NamedTempFile::new().unwrap();
        let mut detector = detector();
        detector.load_model(weights.path()).unwrap();

        let metrics = detector.validate(Path::new("data.yaml")).unwrap();
        assert_eq!(metrics.map50, 0.95);
        assert_eq!(metrics.map50_95, 0.6);
    }
}
