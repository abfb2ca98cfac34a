// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Detect Invoker
//!
//! Single-shot YOLO object detection for a calling process. The `detect`
//! binary loads a trained ONNX detection model, runs it on one image and
//! prints exactly one line to stdout:
//!
//! | Case | Line | Exit code |
//! |------|------|-----------|
//! | objects found | `cat,dog` | 0 |
//! | nothing found | `none` | 0 |
//! | any failure | `error:<message>` | 1 |
//!
//! Labels are unique and sorted. Diagnostics (`--verbose`) go to stderr.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Model defaults to runs/detect/train2/weights/best.onnx
//! detect uploads/latest.jpg
//!
//! # Custom thresholds, save an annotated copy to temp_results/result.jpg
//! detect uploads/latest.jpg --conf 0.5 --save
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use std::path::Path;
//! use detect_invoker::{Outcome, YoloDetector, invoke};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut detector = YoloDetector::load("runs/detect/train2/weights/best.onnx")?;
//! let report = invoke(&mut detector, Path::new("frame.jpg"), None)?;
//! println!("{}", Outcome::Labels(report.labels).line());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`invoke`] | Invocation contract, [`Outcome`] rendering |
//! | [`model`] | [`YoloDetector`] and the [`ObjectDetector`] trait |
//! | [`results`] | [`Detections`] and the printed [`LabelSet`] |
//! | [`config`] | [`InferenceConfig`] and fixed paths |
//! | [`error`] | Error types ([`DetectError`], [`Result`]) |
//! | [`preprocessing`] | Letterbox resize into the input tensor |
//! | [`postprocessing`] | Output decoding and NMS |
//! | [`metadata`] | ONNX model metadata parsing |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `annotate` | Annotated image saving with `--save` (default) |

// Modules
#[cfg(feature = "annotate")]
pub mod annotate;
pub mod cli;
pub mod config;
pub mod error;
pub mod invoke;
#[cfg(feature = "annotate")]
pub mod io;
pub mod metadata;
pub mod model;
pub mod postprocessing;
pub mod preprocessing;
pub mod results;
pub mod utils;

// Re-export main types for convenience
pub use config::{InferenceConfig, SaveNaming};
pub use error::{DetectError, Result};
pub use invoke::{Outcome, Report, ResultSink, invoke};
pub use metadata::ModelMetadata;
pub use model::{ObjectDetector, YoloDetector};
pub use results::{Detection, Detections, LabelSet, Speed};

#[cfg(feature = "annotate")]
pub use io::ResultSaver;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "detect-invoker");
    }
}
