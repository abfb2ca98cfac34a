// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Persisting annotated result images.

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use image::DynamicImage;

use crate::annotate::{annotate_image, load_font};
use crate::config::SaveNaming;
use crate::error::{DetectError, Result};
use crate::results::Detections;

/// Writes an annotated copy of each processed image into a directory.
///
/// With [`SaveNaming::Fixed`] every run writes the same file, so two
/// processes saving at once race on it.
pub struct ResultSaver {
    save_dir: PathBuf,
    naming: SaveNaming,
    font: Option<FontVec>,
}

impl ResultSaver {
    /// Create a saver; the directory is created on first save.
    #[must_use]
    pub fn new(save_dir: impl Into<PathBuf>, naming: SaveNaming) -> Self {
        Self {
            save_dir: save_dir.into(),
            naming,
            font: load_font(),
        }
    }

    /// Annotate `image` and write it, returning the written path.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::SaveError`] if the directory cannot be created
    /// or the image cannot be encoded.
    pub fn save(&self, input: &Path, image: &DynamicImage, detections: &Detections) -> Result<PathBuf> {
        fs::create_dir_all(&self.save_dir).map_err(|e| {
            DetectError::SaveError(format!(
                "failed to create {}: {e}",
                self.save_dir.display()
            ))
        })?;

        let path = self.naming.resolve(&self.save_dir, input);
        let annotated = annotate_image(image, detections, self.font.as_ref());
        annotated
            .save(&path)
            .map_err(|e| DetectError::SaveError(format!("failed to write {}: {e}", path.display())))?;

        Ok(path)
    }
}

impl std::fmt::Debug for ResultSaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSaver")
            .field("save_dir", &self.save_dir)
            .field("naming", &self.naming)
            .field("font", &self.font.is_some())
            .finish()
    }
}
