use std::fs::{self, File};
use std::io;

use serde::Deserialize;
use tracing::info;

use crate::config::DatasetConfig;
use crate::error::{Error, Result};

/// External collaborator that populates the dataset directory. Failures are
/// fatal; retrying is up to the operator.
pub trait DatasetSource {
    fn download(&self, config: &DatasetConfig) -> Result<()>;
}

/// Export format requested from Roboflow.
const EXPORT_FORMAT: &str = "yolov8";

#[derive(Debug, Deserialize)]
struct ExportResponse {
    export: ExportLink,
}

#[derive(Debug, Deserialize)]
struct ExportLink {
    link: String,
}

/// Downloads a dataset version through the Roboflow export API: one request
/// for the export descriptor, one for the zip archive, extracted into the
/// configured base path.
pub struct RoboflowSource {
    api_base: String,
}

impl RoboflowSource {
    pub fn new() -> Self {
        Self {
            api_base: "https://api.roboflow.com".to_string(),
        }
    }

    /// Points the source at a different API host (used against mirrors).
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
        }
    }
}

impl Default for RoboflowSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetSource for RoboflowSource {
    fn download(&self, config: &DatasetConfig) -> Result<()> {
        let export_url = format!(
            "{}/{}/{}/{}/{}?api_key={}",
            self.api_base,
            config.workspace,
            config.project,
            config.version,
            EXPORT_FORMAT,
            config.api_key
        );

        info!(
            workspace = %config.workspace,
            project = %config.project,
            version = config.version,
            "requesting dataset export"
        );

        let export: ExportResponse = ureq::get(&export_url)
            .call()
            .map_err(|e| Error::Download(format!("export request failed: {e}")))?
            .into_json()
            .map_err(|e| Error::Download(format!("unexpected export response: {e}")))?;

        fs::create_dir_all(&config.base_path)?;
        let archive_path = config.base_path.join("roboflow_export.zip");

        let response = ureq::get(&export.export.link)
            .call()
            .map_err(|e| Error::Download(format!("archive request failed: {e}")))?;
        let mut reader = response.into_reader();
        let mut file = File::create(&archive_path)?;
        io::copy(&mut reader, &mut file)?;

        let archive = File::open(&archive_path)?;
        let mut archive = zip::ZipArchive::new(archive)
            .map_err(|e| Error::Download(format!("invalid export archive: {e}")))?;
        archive
            .extract(&config.base_path)
            .map_err(|e| Error::Download(format!("failed to extract export: {e}")))?;

        fs::remove_file(&archive_path)?;
        info!("dataset extracted to {}", config.base_path.display());
        Ok(())
    }
}
