// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Inference configuration and fixed filesystem locations.
//!
//! The invoker runs against a model artifact at a fixed relative path and
//! writes its optional annotated image to a fixed relative directory. Both can
//! be overridden from the command line, but nothing is read from the
//! environment.

use std::path::{Path, PathBuf};

use crate::error::{DetectError, Result};

/// Relative path of the trained detection weights (ONNX export of `best.pt`).
pub const DEFAULT_MODEL_PATH: &str = "runs/detect/train2/weights/best.onnx";

/// Relative directory for annotated result images.
pub const DEFAULT_SAVE_DIR: &str = "temp_results";

/// File name used for the annotated image when not derived from the input.
pub const RESULT_FILENAME: &str = "result.jpg";

/// Largest accepted input side; bigger tensors cannot be allocated sensibly.
pub const MAX_IMGSZ: usize = 8192;

/// Thresholds and sizing for a single forward pass.
///
/// # Example
///
/// ```rust
/// use detect_invoker::InferenceConfig;
///
/// let config = InferenceConfig::new()
///     .with_confidence(0.5)
///     .with_iou(0.45)
///     .with_max_detections(100)
///     .with_imgsz(640, 640);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    /// Minimum class score for a candidate box to be kept.
    pub confidence_threshold: f32,
    /// `IoU` above which a lower-scoring box of the same class is suppressed.
    pub iou_threshold: f32,
    /// Maximum number of detections kept per image.
    pub max_detections: usize,
    /// Explicit input size (height, width). `None` uses the model metadata.
    pub imgsz: Option<(usize, usize)>,
    /// Intra-op threads for ONNX Runtime, `0` lets the runtime decide.
    pub num_threads: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
            imgsz: None,
            num_threads: 0,
        }
    }
}

impl InferenceConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the confidence threshold.
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the `IoU` threshold used by non-maximum suppression.
    #[must_use]
    pub const fn with_iou(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the maximum number of detections.
    #[must_use]
    pub const fn with_max_detections(mut self, max: usize) -> Self {
        self.max_detections = max;
        self
    }

    /// Set the input image size as (height, width).
    #[must_use]
    pub const fn with_imgsz(mut self, height: usize, width: usize) -> Self {
        self.imgsz = Some((height, width));
        self
    }

    /// Set the number of intra-op threads.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Check that thresholds lie in `[0, 1]` and sizes are non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::InvalidArgument`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DetectError::InvalidArgument(format!(
                "conf must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(DetectError::InvalidArgument(format!(
                "iou must be within [0, 1], got {}",
                self.iou_threshold
            )));
        }
        if self.max_detections == 0 {
            return Err(DetectError::InvalidArgument(
                "max-det must be at least 1".to_string(),
            ));
        }
        if let Some((h, w)) = self.imgsz
            && (h == 0 || w == 0 || h > MAX_IMGSZ || w > MAX_IMGSZ)
        {
            return Err(DetectError::InvalidArgument(format!(
                "imgsz must be within [1, {MAX_IMGSZ}], got {h}x{w}"
            )));
        }
        Ok(())
    }
}

/// Round each side of `imgsz` up to a multiple of `stride` (0 is treated as 1).
#[must_use]
pub fn align_imgsz(imgsz: (usize, usize), stride: u32) -> (usize, usize) {
    let stride = usize::try_from(stride).unwrap_or(1).max(1);
    (imgsz.0.div_ceil(stride) * stride, imgsz.1.div_ceil(stride) * stride)
}

/// How the annotated image file is named inside the save directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveNaming {
    /// Always `result.jpg`; each run overwrites the previous one.
    #[default]
    Fixed,
    /// The input's file name, so concurrent callers do not collide.
    FromInput,
}

impl SaveNaming {
    /// Resolve the output path for `input` inside `save_dir`.
    #[must_use]
    pub fn resolve(self, save_dir: &Path, input: &Path) -> PathBuf {
        match self {
            Self::Fixed => save_dir.join(RESULT_FILENAME),
            Self::FromInput => {
                let stem = input
                    .file_stem()
                    .map_or_else(|| "result".into(), |s| s.to_string_lossy());
                save_dir.join(format!("{stem}.jpg"))
            }
        }
    }
}
