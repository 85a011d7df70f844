use std::path::Path;

use tracing::info;

use crate::config::AppConfig;
use crate::dataset::{DatasetManager, RoboflowSource};
use crate::detection::PpeDetector;
use crate::error::Result;
use crate::models::ValidationMetrics;
use crate::visualizer::Visualizer;

/// Sequences the full workflow: dataset preparation, optional training,
/// model load, validation, a test inference and finally the web interface.
pub struct PpeApp {
    config: AppConfig,
    dataset_manager: DatasetManager,
    detector: PpeDetector,
    visualizer: Visualizer,
}

impl PpeApp {
    /// Wires the production collaborators from a validated configuration.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;

        info!("initializing components");
        let dataset_manager = DatasetManager::new(
            config.dataset.clone(),
            Box::new(RoboflowSource::new()),
        );
        let detector = PpeDetector::with_onnx(config.model.clone());
        let visualizer = Visualizer::new(config.visualization.clone())?;

        Ok(Self {
            config,
            dataset_manager,
            detector,
            visualizer,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Downloads (when needed) and splits the dataset.
    pub fn setup_dataset(&self) -> Result<()> {
        info!("== preparing dataset ==");
        self.dataset_manager.prepare()
    }

    /// Trains a model on the prepared dataset and loads the result.
    pub fn train_model(&mut self) -> Result<()> {
        info!("== training model ==");
        self.detector.train(
            &self.config.dataset.data_yaml_path(),
            &self.config.save_dir,
            &self.config.project_name,
        )?;
        info!("model saved to {}", self.config.best_model_path().display());
        Ok(())
    }

    /// Loads weights from `path`, or from the configured best-model path.
    pub fn load_trained_model(&mut self, path: Option<&Path>) -> Result<()> {
        info!("== loading model ==");
        let best = self.config.best_model_path();
        self.detector.load_model(path.unwrap_or(&best))
    }

    /// Validates the loaded model against the dataset manifest.
    pub fn validate_model(&mut self) -> Result<ValidationMetrics> {
        info!("== validating model ==");
        self.detector.validate(&self.config.dataset.data_yaml_path())
    }

    /// Runs one inference on the first validation image, if any.
    pub fn test_inference(&mut self) -> Result<()> {
        info!("== testing inference ==");
        match self.dataset_manager.validation_images()?.first() {
            Some(image) => {
                self.detector.test_inference(image)?;
            }
            None => info!("no validation image found, skipping test inference"),
        }
        Ok(())
    }

    /// Human-readable configuration and dataset overview, shown at startup
    /// and on the web page.
    pub fn system_info(&self) -> String {
        let stats = self.dataset_manager.stats().unwrap_or(crate::models::DatasetStats {
            train_images: 0,
            valid_images: 0,
        });
        let mut names: Vec<&str> = self
            .detector
            .class_names()
            .values()
            .map(String::as_str)
            .collect();
        names.sort_unstable();

        format!(
            "{}\nDataset treino: {} imagens\nDataset validação: {} imagens\nClasses: {}",
            self.config,
            stats.train_images,
            stats.valid_images,
            if names.is_empty() {
                "-".to_string()
            } else {
                names.join(", ")
            }
        )
    }

    /// Serves the web interface, blocking until shutdown.
    #[cfg(feature = "ui")]
    pub fn launch_interface(self, share: bool, port: u16) -> anyhow::Result<()> {
        use std::sync::{Arc, Mutex};

        info!("== launching web interface ==");
        let system_info = self.system_info();
        let interface = crate::ui::WebInterface::new(
            Arc::new(Mutex::new(self.detector)),
            Arc::new(self.visualizer),
            system_info,
        );
        interface.launch(share, port)
    }

    /// The complete pipeline: dataset, training (or loading), validation,
    /// test inference and, optionally, the web interface.
    pub fn run_full_pipeline(
        mut self,
        skip_training: bool,
        launch_ui: bool,
        share: bool,
        port: u16,
    ) -> anyhow::Result<()> {
        self.setup_dataset()?;

        if skip_training {
            info!("skipping training, loading existing model");
            self.load_trained_model(None)?;
        } else {
            self.train_model()?;
        }

        self.validate_model()?;
        self.test_inference()?;

        if launch_ui {
            #[cfg(feature = "ui")]
            {
                self.launch_interface(share, port)?;
            }
            #[cfg(not(feature = "ui"))]
            {
                let _ = (share, port);
                tracing::warn!("built without the ui feature, skipping web interface");
            }
        } else {
            info!("pipeline finished");
        }

        Ok(())
    }
}
