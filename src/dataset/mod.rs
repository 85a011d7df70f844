pub mod roboflow;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{DatasetConfig, SplitOrder};
use crate::error::{Error, Result};
use crate::models::DatasetStats;

pub use roboflow::{DatasetSource, RoboflowSource};

/// Extension of the dataset image files.
pub const IMAGE_EXTENSION: &str = "jpg";
/// Extension of the YOLO label files paired with each image.
pub const LABEL_EXTENSION: &str = "txt";

/// Filesystem bookkeeping for the dataset: ensures it exists locally
/// (delegating the download to a [`DatasetSource`]), counts the splits and
/// carves a validation split out of the training set when none exists.
pub struct DatasetManager {
    config: DatasetConfig,
    source: Box<dyn DatasetSource>,
}

impl DatasetManager {
    pub fn new(config: DatasetConfig, source: Box<dyn DatasetSource>) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Image counts of the train and valid splits. Missing directories count
    /// as zero.
    pub fn stats(&self) -> Result<DatasetStats> {
        Ok(DatasetStats {
            train_images: count_files(&self.config.train_images_path(), IMAGE_EXTENSION)?,
            valid_images: count_files(&self.config.valid_images_path(), IMAGE_EXTENSION)?,
        })
    }

    /// Validation images in directory order, used for inference smoke tests.
    pub fn validation_images(&self) -> Result<Vec<PathBuf>> {
        list_files(&self.config.valid_images_path(), IMAGE_EXTENSION)
    }

    /// Ensures the dataset is present and structurally complete.
    ///
    /// Downloads when the train images directory is absent (any source
    /// failure is fatal, there is no retry), creates the validation split
    /// when needed and re-checks the four required directories afterwards.
    /// Re-running with an existing split only recomputes the counts.
    pub fn prepare(&self) -> Result<()> {
        if !self.config.train_images_path().exists() {
            info!("dataset not found locally, starting download");
            self.source.download(&self.config)?;
            info!("dataset downloaded to {}", self.config.base_path.display());
        } else {
            info!("dataset already exists, skipping download");
        }

        self.create_validation_split()?;
        self.validate_structure()?;

        info!("dataset prepared successfully");
        Ok(())
    }

    /// Fails with [`Error::StructuralInvalid`] unless all four split
    /// directories exist.
    pub fn validate_structure(&self) -> Result<()> {
        let required = [
            self.config.train_images_path(),
            self.config.train_labels_path(),
            self.config.valid_images_path(),
            self.config.valid_labels_path(),
        ];

        let missing: Vec<PathBuf> = required.into_iter().filter(|p| !p.exists()).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::StructuralInvalid(missing))
        }
    }

    /// Creates the validation split when the valid set is empty; a no-op
    /// otherwise.
    pub fn create_validation_split(&self) -> Result<()> {
        let stats = self.stats()?;
        info!(
            train = stats.train_images,
            valid = stats.valid_images,
            "current dataset structure"
        );

        if stats.valid_images == 0 {
            self.perform_split(stats.train_images)?;
        } else {
            info!("validation split already exists");
        }

        Ok(())
    }

    fn perform_split(&self, train_count: usize) -> Result<()> {
        info!("creating validation split");

        fs::create_dir_all(self.config.valid_images_path())?;
        fs::create_dir_all(self.config.valid_labels_path())?;

        let train_images = self.list_train_images()?;
        debug_assert_eq!(train_images.len(), train_count);

        let n_valid = self
            .config
            .min_validation_samples
            .max((train_count as f32 * self.config.validation_split) as usize);
        let n_valid = n_valid.min(train_images.len());

        let moved = self.move_to_valid(&train_images[..n_valid])?;
        info!(moved, "moved images to validation");

        let final_stats = self.stats()?;
        info!(
            train = final_stats.train_images,
            valid = final_stats.valid_images,
            "final dataset structure"
        );
        Ok(())
    }

    /// Training images in split order: the raw directory listing by default
    /// (a documented nondeterminism inherited from the original pipeline),
    /// or lexicographic when configured.
    fn list_train_images(&self) -> Result<Vec<PathBuf>> {
        let mut images = list_files(&self.config.train_images_path(), IMAGE_EXTENSION)?;
        if self.config.split_order == SplitOrder::Sorted {
            images.sort();
        }
        Ok(images)
    }

    /// Moves each image to the valid split, along with its same-stem label
    /// file when one exists. Images without a label stay unpaired; that is
    /// not an error. Moves are sequential and not transactional.
    fn move_to_valid(&self, images: &[PathBuf]) -> Result<usize> {
        let valid_images = self.config.valid_images_path();
        let train_labels = self.config.train_labels_path();
        let valid_labels = self.config.valid_labels_path();

        let mut moved = 0;
        for image in images {
            let file_name = image
                .file_name()
                .ok_or_else(|| Error::Io(std::io::Error::other("image path has no file name")))?;
            fs::rename(image, valid_images.join(file_name))?;

            if let Some(stem) = image.file_stem() {
                let mut label_name = stem.to_os_string();
                label_name.push(".");
                label_name.push(LABEL_EXTENSION);
                let label = train_labels.join(&label_name);
                if label.exists() {
                    fs::rename(&label, valid_labels.join(&label_name))?;
                } else {
                    debug!("no label file for {}", image.display());
                }
            }

            moved += 1;
        }

        Ok(moved)
    }
}

fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    Ok(files)
}

fn count_files(dir: &Path, extension: &str) -> Result<usize> {
    Ok(list_files(dir, extension)?.len())
}
