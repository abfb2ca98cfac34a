// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Model loading and the forward pass.
//!
//! [`YoloDetector`] is the process-lifetime model handle: it is built once
//! from the weights file, never mutated in any observable way, and dropped at
//! exit. Callers hand it to [`crate::invoke::invoke`] explicitly through the
//! [`ObjectDetector`] trait.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;

use crate::config::{InferenceConfig, align_imgsz};
use crate::error::{DetectError, Result};
use crate::metadata::{METADATA_KEYS, ModelMetadata};
use crate::postprocessing::postprocess_detect;
use crate::preprocessing::preprocess_image;
use crate::results::Detections;

/// Anything that can turn an image into detections.
///
/// `&mut self` because ONNX Runtime sessions need exclusive access to run;
/// a shared handle must be wrapped in a mutex.
pub trait ObjectDetector {
    /// Run one forward pass over `image`.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::InferenceError`] if the forward pass or output
    /// decoding fails.
    fn detect(&mut self, image: &DynamicImage) -> Result<Detections>;
}

/// YOLO detection model backed by an ONNX Runtime session.
pub struct YoloDetector {
    session: Session,
    metadata: ModelMetadata,
    input_name: String,
    output_name: String,
    config: InferenceConfig,
}

impl YoloDetector {
    /// Load a detection model with default thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelLoadError`] if the file is missing, is not
    /// a valid ONNX model, or is not a detection model.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_config(path, InferenceConfig::default())
    }

    /// Load a detection model with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelLoadError`] if the file is missing, is not
    /// a valid ONNX model, or is not a detection model, and
    /// [`DetectError::InvalidArgument`] if `config` is out of range.
    pub fn load_with_config<P: AsRef<Path>>(path: P, config: InferenceConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate()?;

        if !path.is_file() {
            return Err(DetectError::ModelLoadError(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| DetectError::ModelLoadError(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DetectError::ModelLoadError(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(config.num_threads)
            .map_err(|e| DetectError::ModelLoadError(format!("failed to set intra-thread count: {e}")))?
            .commit_from_file(path)
            .map_err(|e| {
                DetectError::ModelLoadError(format!("failed to load {}: {e}", path.display()))
            })?;

        let metadata = Self::read_metadata(&session)?;
        metadata.ensure_detect()?;

        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "images".to_string(), |i| i.name.clone());
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| DetectError::ModelLoadError("model declares no outputs".to_string()))?;

        let imgsz = align_imgsz(config.imgsz.unwrap_or(metadata.imgsz), metadata.stride);
        let config = InferenceConfig {
            imgsz: Some(imgsz),
            ..config
        };
        config
            .validate()
            .map_err(|e| DetectError::ModelLoadError(format!("unusable model input size: {e}")))?;

        Ok(Self {
            session,
            metadata,
            input_name,
            output_name,
            config,
        })
    }

    /// Collect the exporter's custom metadata properties.
    fn read_metadata(session: &Session) -> Result<ModelMetadata> {
        let model_metadata = session
            .metadata()
            .map_err(|e| DetectError::ModelLoadError(format!("failed to read model metadata: {e}")))?;

        let props: HashMap<String, String> = METADATA_KEYS
            .iter()
            .filter_map(|key| {
                model_metadata
                    .custom(key)
                    .ok()
                    .flatten()
                    .map(|value| ((*key).to_string(), value))
            })
            .collect();

        if !props.is_empty() {
            return ModelMetadata::from_properties(&props);
        }

        // Some exports keep everything in one YAML blob.
        for key in ["metadata", "model_metadata"] {
            if let Ok(Some(yaml)) = model_metadata.custom(key) {
                return ModelMetadata::from_yaml_str(&yaml);
            }
        }

        Ok(ModelMetadata::default())
    }

    /// Input size used for preprocessing (height, width).
    #[must_use]
    pub fn imgsz(&self) -> (usize, usize) {
        self.config.imgsz.unwrap_or(self.metadata.imgsz)
    }

    /// Model metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

/// One ONNX Runtime forward pass, returning the flat output and its shape.
fn forward(
    session: &mut Session,
    input_name: &str,
    output_name: &str,
    input: &Array4<f32>,
) -> Result<(Vec<f32>, Vec<usize>)> {
    let input = input.as_standard_layout();
    let tensor = TensorRef::from_array_view(&input)
        .map_err(|e| DetectError::InferenceError(format!("failed to create input tensor: {e}")))?;

    let outputs = session
        .run(ort::inputs![input_name => tensor])
        .map_err(|e| DetectError::InferenceError(format!("forward pass failed: {e}")))?;

    let output = outputs
        .get(output_name)
        .ok_or_else(|| DetectError::InferenceError(format!("output '{output_name}' not found")))?;

    let (shape, data) = output
        .try_extract_tensor::<f32>()
        .map_err(|e| DetectError::InferenceError(format!("failed to extract output: {e}")))?;

    let shape = shape
        .iter()
        .map(|&d| {
            usize::try_from(d)
                .map_err(|_| DetectError::InferenceError(format!("dynamic output dimension {d}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((data.to_vec(), shape))
}

/// Letterbox `image`, hand the tensor to `run` and decode what comes back.
///
/// `config.imgsz` must be set; stage timings are recorded on the result.
fn detect_with<F>(
    image: &DynamicImage,
    config: &InferenceConfig,
    names: &HashMap<usize, String>,
    run: F,
) -> Result<Detections>
where
    F: FnOnce(&Array4<f32>) -> Result<(Vec<f32>, Vec<usize>)>,
{
    let imgsz = config
        .imgsz
        .ok_or_else(|| DetectError::InferenceError("input size not resolved".to_string()))?;

    let start = Instant::now();
    let preprocessed = preprocess_image(image, imgsz)?;
    let preprocess_ms = start.elapsed().as_secs_f64() * 1000.0;

    let start = Instant::now();
    let (output, shape) = run(&preprocessed.tensor)?;
    let inference_ms = start.elapsed().as_secs_f64() * 1000.0;

    let start = Instant::now();
    let mut detections = postprocess_detect(&output, &shape, &preprocessed, config, names)?;
    detections.speed.preprocess = preprocess_ms;
    detections.speed.inference = inference_ms;
    detections.speed.postprocess = start.elapsed().as_secs_f64() * 1000.0;

    Ok(detections)
}

impl ObjectDetector for YoloDetector {
    fn detect(&mut self, image: &DynamicImage) -> Result<Detections> {
        let Self {
            session,
            metadata,
            input_name,
            output_name,
            config,
        } = self;
        detect_with(image, config, &metadata.names, |input| {
            forward(session, input_name, output_name, input)
        })
    }
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("task", &self.metadata.task)
            .field("num_classes", &self.metadata.num_classes())
            .field("imgsz", &self.imgsz())
            .field("input", &self.input_name)
            .field("output", &self.output_name)
            .finish_non_exhaustive()
    }
}
