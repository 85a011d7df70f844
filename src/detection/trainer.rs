use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::models::ValidationMetrics;

/// Training/validation side of the detection-model collaborator. Both calls
/// are blocking and fatal on failure. `Send` for the same reason as
/// [`ModelBackend`](super::ModelBackend): the detector travels into the web
/// interface's shared state.
pub trait ModelTrainer: Send {
    /// Trains from the manifest and returns the path of the exported weights.
    fn train(
        &self,
        config: &ModelConfig,
        data_yaml: &Path,
        project_dir: &Path,
        run_name: &str,
    ) -> Result<PathBuf>;

    /// Validates `model_path` on the manifest's validation split.
    fn validate(&self, model_path: &Path, data_yaml: &Path) -> Result<ValidationMetrics>;
}

/// Drives the external `yolo` command line: `detect train` followed by an
/// ONNX export, and `detect val` with the metrics table parsed from stdout.
pub struct UltralyticsCli {
    program: String,
}

impl UltralyticsCli {
    pub fn new() -> Self {
        Self {
            program: "yolo".to_string(),
        }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[String]) -> Result<String> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| Error::Training(format!("failed to run {}: {e}", self.program)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Training(format!(
                "{} {} exited with {}: {}",
                self.program,
                args.first().map(String::as_str).unwrap_or(""),
                output.status,
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

impl Default for UltralyticsCli {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelTrainer for UltralyticsCli {
    fn train(
        &self,
        config: &ModelConfig,
        data_yaml: &Path,
        project_dir: &Path,
        run_name: &str,
    ) -> Result<PathBuf> {
        let args = vec![
            "detect".to_string(),
            "train".to_string(),
            format!("model={}", config.name),
            format!("data={}", data_yaml.display()),
            format!("epochs={}", config.epochs),
            format!("imgsz={}", config.image_size),
            format!("batch={}", config.batch_size),
            format!("device={}", config.device),
            format!("workers={}", config.workers),
            format!("cache={}", config.cache),
            format!("patience={}", config.patience),
            format!("project={}", project_dir.display()),
            format!("name={run_name}"),
            "exist_ok=True".to_string(),
            "plots=False".to_string(),
        ];

        info!(epochs = config.epochs, "starting training run");
        self.run(&args)?;

        let best = project_dir.join(run_name).join("weights").join("best.pt");
        if !best.exists() {
            return Err(Error::Training(format!(
                "training finished but {} is missing",
                best.display()
            )));
        }

        // The inference backend consumes ONNX, so export the best epoch.
        info!("exporting trained weights to ONNX");
        self.run(&[
            "export".to_string(),
            format!("model={}", best.display()),
            "format=onnx".to_string(),
        ])?;

        let exported = best.with_extension("onnx");
        if !exported.exists() {
            return Err(Error::Training(format!(
                "export finished but {} is missing",
                exported.display()
            )));
        }
        Ok(exported)
    }

    fn validate(&self, model_path: &Path, data_yaml: &Path) -> Result<ValidationMetrics> {
        let stdout = self.run(&[
            "detect".to_string(),
            "val".to_string(),
            format!("model={}", model_path.display()),
            format!("data={}", data_yaml.display()),
        ])?;

        parse_val_metrics(&stdout)
    }
}

/// Pulls the overall metrics out of the `yolo detect val` table. The row of
/// interest starts with `all` and ends with four floats in the order
/// `P R mAP50 mAP50-95`.
fn parse_val_metrics(stdout: &str) -> Result<ValidationMetrics> {
    for line in stdout.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("all") {
            continue;
        }

        let numbers: Vec<f64> = tokens.filter_map(|t| t.parse().ok()).collect();
        if numbers.len() < 4 {
            continue;
        }

        let tail = &numbers[numbers.len() - 4..];
        return Ok(ValidationMetrics {
            precision: tail[0],
            recall: tail[1],
            map50: tail[2],
            map50_95: tail[3],
        });
    }

    Err(Error::Training(
        "validation output contained no overall metrics row".to_string(),
    ))
}
