// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::Parser;

use crate::config::{DEFAULT_MODEL_PATH, DEFAULT_SAVE_DIR, InferenceConfig, SaveNaming};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(name = "detect", author, version, about, long_about = None)]
#[command(after_help = r#"Output:
    Exactly one line on stdout:
      cat,dog            labels of detected objects, each once
      none               the image decoded and nothing was found
      error:<message>    the model, image or forward pass failed
    Exit code is 0 for labels and none, 1 otherwise.

Examples:
    detect uploads/latest.jpg
    detect uploads/latest.jpg --conf 0.5 --save
    detect frame.png --model weights/best.onnx --save --name-from-input --verbose"#)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Image to run detection on
    pub image: PathBuf,

    /// Path to ONNX model file
    #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    /// Confidence threshold
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// `IoU` threshold for NMS
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// Maximum detections per image
    #[arg(long, default_value_t = 300)]
    pub max_det: usize,

    /// Inference image size (square)
    #[arg(long)]
    pub imgsz: Option<usize>,

    /// Intra-op threads for ONNX Runtime (0 = runtime default)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Save an annotated copy of the image
    #[arg(long, default_value_t = false)]
    pub save: bool,

    /// Directory for annotated images
    #[arg(long, default_value = DEFAULT_SAVE_DIR)]
    pub save_dir: PathBuf,

    /// Name the annotated image after the input instead of result.jpg
    #[arg(long, default_value_t = false)]
    pub name_from_input: bool,

    /// Print diagnostics to stderr
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Inference settings from the threshold and sizing flags.
    #[must_use]
    pub fn inference_config(&self) -> InferenceConfig {
        let config = InferenceConfig::new()
            .with_confidence(self.conf)
            .with_iou(self.iou)
            .with_max_detections(self.max_det)
            .with_threads(self.threads);

        match self.imgsz {
            Some(sz) => config.with_imgsz(sz, sz),
            None => config,
        }
    }

    /// Naming policy for the annotated image.
    #[must_use]
    pub const fn save_naming(&self) -> SaveNaming {
        if self.name_from_input {
            SaveNaming::FromInput
        } else {
            SaveNaming::Fixed
        }
    }
}
