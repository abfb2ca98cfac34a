// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The detector invocation contract.
//!
//! One call handles one image: decode, detect, collect labels and optionally
//! persist an annotated copy. The caller reads exactly one line from stdout,
//! produced by [`Outcome::line`]:
//!
//! | Case | Line | Exit code |
//! |------|------|-----------|
//! | objects found | `cat,dog` (unique, lexical order) | 0 |
//! | nothing found | `none` | 0 |
//! | model, decode or inference failure | `error:<message>` | 1 |
//!
//! An image that cannot be read or decoded is reported as an error, never as
//! `none`, so the sentinel always means "decoded and found nothing".

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};

use crate::error::{DetectError, Result};
use crate::model::ObjectDetector;
use crate::results::{Detections, LabelSet};

/// Prefix of the error line.
pub const ERROR_PREFIX: &str = "error:";

/// Process exit code for success, including the `none` case.
pub const EXIT_SUCCESS: i32 = 0;

/// Process exit code for every failure.
pub const EXIT_FAILURE: i32 = 1;

/// Destination for annotated results.
pub trait ResultSink {
    /// Persist an annotated copy of `image`, returning where it was written.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::SaveError`] on failure.
    fn persist(&self, input: &Path, image: &DynamicImage, detections: &Detections) -> Result<PathBuf>;
}

#[cfg(feature = "annotate")]
impl ResultSink for crate::io::ResultSaver {
    fn persist(&self, input: &Path, image: &DynamicImage, detections: &Detections) -> Result<PathBuf> {
        self.save(input, image, detections)
    }
}

/// Everything one invocation produced.
#[derive(Debug)]
pub struct Report {
    /// Labels to print.
    pub labels: LabelSet,
    /// Raw detections, for diagnostics.
    pub detections: Detections,
    /// Result of the annotated-image write, if one was requested.
    pub persisted: Option<Result<PathBuf>>,
}

/// Decode an image, sniffing the format from its content first.
///
/// # Errors
///
/// Returns [`DetectError::DecodeFailure`] if the file is missing, unreadable
/// or not a supported image.
pub fn decode_image(path: &Path) -> Result<DynamicImage> {
    let reader = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| DetectError::DecodeFailure(format!("cannot read {}: {e}", path.display())))?;

    reader
        .decode()
        .map_err(|e| DetectError::DecodeFailure(format!("cannot decode {}: {e}", path.display())))
}

/// Run the detector on the image at `image_path`.
///
/// The annotated image is written only after the labels are known, and a
/// failed write is reported in [`Report::persisted`] without failing the call.
///
/// # Errors
///
/// Returns [`DetectError::DecodeFailure`] for unreadable images and
/// [`DetectError::InferenceError`] if detection fails.
pub fn invoke<D: ObjectDetector + ?Sized>(
    detector: &mut D,
    image_path: &Path,
    sink: Option<&dyn ResultSink>,
) -> Result<Report> {
    let image = decode_image(image_path)?;
    let detections = detector.detect(&image)?;
    let labels = detections.labels();

    let persisted = sink.map(|sink| sink.persist(image_path, &image, &detections));

    Ok(Report {
        labels,
        detections,
        persisted,
    })
}

/// Final state of the process, mapped onto stdout and the exit code.
#[derive(Debug)]
pub enum Outcome {
    /// Detection ran; the set may be empty.
    Labels(LabelSet),
    /// Any failure before labels were produced.
    Failed(DetectError),
}

impl Outcome {
    /// The single stdout line.
    #[must_use]
    pub fn line(&self) -> String {
        match self {
            Self::Labels(labels) => labels.to_string(),
            Self::Failed(err) => {
                let message = err.to_string();
                let message: Vec<&str> = message.split_whitespace().collect();
                format!("{ERROR_PREFIX}{}", message.join(" "))
            }
        }
    }

    /// Process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Labels(_) => EXIT_SUCCESS,
            Self::Failed(_) => EXIT_FAILURE,
        }
    }
}

impl From<Result<LabelSet>> for Outcome {
    fn from(result: Result<LabelSet>) -> Self {
        match result {
            Ok(labels) => Self::Labels(labels),
            Err(err) => Self::Failed(err),
        }
    }
}
