use std::collections::HashMap;
use std::path::Path;

use image::DynamicImage;

use crate::error::Result;
use crate::models::RawDetection;

/// Inference side of the detection-model collaborator. The facade owns the
/// Unloaded/Loaded state machine; implementations only need to answer calls
/// made after a successful `load`. `Send` because the web interface keeps
/// the detector behind a shared mutex.
pub trait ModelBackend: Send {
    /// Loads model weights from disk.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Class id to name mapping of the loaded model. Empty before `load`.
    fn class_names(&self) -> &HashMap<usize, String>;

    /// Runs one inference pass, keeping boxes scoring at least `confidence`.
    /// Boxes are `(x1, y1, x2, y2)` in source-image pixels.
    fn predict_raw(&mut self, image: &DynamicImage, confidence: f32) -> Result<Vec<RawDetection>>;
}
