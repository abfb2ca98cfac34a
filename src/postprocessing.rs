// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Post-processing for YOLO detection outputs.
//!
//! Detection heads emit `[1, 4 + nc, N]` (or the transposed `[1, N, 4 + nc]`)
//! where each of the `N` candidates carries `cx, cy, w, h` followed by one
//! score per class.

use std::collections::HashMap;

use ndarray::{Array2, ArrayView2, s};

use crate::config::InferenceConfig;
use crate::error::{DetectError, Result};
use crate::preprocessing::{PreprocessResult, clip_coords};
use crate::results::{Detection, Detections};
use crate::utils::nms_per_class;

/// Layout of a detection output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
    /// Number of class scores per candidate.
    pub num_classes: usize,
    /// Number of candidates.
    pub num_predictions: usize,
    /// `true` for `[N, 4 + nc]`, `false` for `[4 + nc, N]`.
    pub transposed: bool,
}

/// Work out the output layout from its shape.
///
/// With an empty label table the class count is inferred from the shape,
/// assuming the feature axis is the shorter one (84 < 8400).
///
/// # Errors
///
/// Returns [`DetectError::InferenceError`] for shapes that cannot hold boxes.
pub fn parse_detect_shape(shape: &[usize], expected_classes: usize) -> Result<OutputLayout> {
    let (a, b) = match shape {
        [a, b] | [1, a, b] => (*a, *b),
        _ => {
            return Err(DetectError::InferenceError(format!(
                "unexpected detection output shape {shape:?}"
            )));
        }
    };

    if a.min(b) == 0 {
        return Ok(OutputLayout {
            num_classes: expected_classes,
            num_predictions: 0,
            transposed: false,
        });
    }

    let transposed = if expected_classes == 0 {
        a > b
    } else if a == 4 + expected_classes {
        false
    } else if b == 4 + expected_classes {
        true
    } else {
        return Err(DetectError::InferenceError(format!(
            "output shape {shape:?} does not match {expected_classes} classes"
        )));
    };

    let (features, predictions) = if transposed { (b, a) } else { (a, b) };
    if features <= 4 {
        return Err(DetectError::InferenceError(format!(
            "output shape {shape:?} has no class scores"
        )));
    }

    Ok(OutputLayout {
        num_classes: features - 4,
        num_predictions: predictions,
        transposed,
    })
}

/// Decode a raw detection output into filtered, suppressed detections.
///
/// # Errors
///
/// Returns [`DetectError::InferenceError`] if the shape is unusable or the
/// data length does not match it.
pub fn postprocess_detect(
    output: &[f32],
    output_shape: &[usize],
    preprocess: &PreprocessResult,
    config: &InferenceConfig,
    names: &HashMap<usize, String>,
) -> Result<Detections> {
    let mut result = Detections::empty(names.clone(), preprocess.orig_shape);

    let layout = parse_detect_shape(output_shape, names.len())?;
    if layout.num_predictions == 0 {
        return Ok(result);
    }

    let features = 4 + layout.num_classes;
    let rows = if layout.transposed {
        Array2::from_shape_vec((layout.num_predictions, features), output.to_vec())
    } else {
        Array2::from_shape_vec((features, layout.num_predictions), output.to_vec())
            .map(|arr| arr.reversed_axes())
    }
    .map_err(|e| DetectError::InferenceError(format!("output data does not fit its shape: {e}")))?;

    let candidates = extract_candidates(rows.view(), preprocess, config.confidence_threshold);

    let keep = nms_per_class(&candidates, config.iou_threshold);
    result.items = keep
        .into_iter()
        .take(config.max_detections)
        .map(|i| candidates[i])
        .collect();

    Ok(result)
}

/// Best class per row, confidence filter and mapping back to image space.
fn extract_candidates(
    rows: ArrayView2<'_, f32>,
    preprocess: &PreprocessResult,
    confidence_threshold: f32,
) -> Vec<Detection> {
    let mut candidates = Vec::new();

    for row in rows.outer_iter() {
        let (class_id, score) = row
            .slice(s![4..])
            .iter()
            .enumerate()
            .map(|(idx, &score)| (idx, if score.is_nan() { 0.0 } else { score }))
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .unwrap_or((0, 0.0));

        if score < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let xyxy = [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0];
        let bbox = clip_coords(&preprocess.letterbox.unmap(&xyxy), preprocess.orig_shape);

        candidates.push(Detection::new(bbox, score, class_id));
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::Letterbox;

    fn identity_preprocess(size: u32) -> PreprocessResult {
        PreprocessResult {
            tensor: ndarray::Array4::zeros((1, 3, 1, 1)),
            orig_shape: (size, size),
            letterbox: Letterbox::fit(size, size, (size as usize, size as usize)),
        }
    }

    fn names() -> HashMap<usize, String> {
        HashMap::from([(0, "cat".to_string()), (1, "dog".to_string())])
    }

    /// Build a `[1, 6, N]` output from `(cx, cy, w, h, cat, dog)` rows.
    fn channel_major(rows: &[[f32; 6]]) -> (Vec<f32>, Vec<usize>) {
        let n = rows.len();
        let mut data = vec![0.0; 6 * n];
        for (i, row) in rows.iter().enumerate() {
            for (f, value) in row.iter().enumerate() {
                data[f * n + i] = *value;
            }
        }
        (data, vec![1, 6, n])
    }

    #[test]
    fn test_parse_detect_shape() {
        let layout = parse_detect_shape(&[1, 84, 8400], 80).unwrap();
        assert_eq!(layout.num_classes, 80);
        assert_eq!(layout.num_predictions, 8400);
        assert!(!layout.transposed);

        let layout = parse_detect_shape(&[1, 8400, 84], 80).unwrap();
        assert_eq!(layout.num_predictions, 8400);
        assert!(layout.transposed);
    }

    #[test]
    fn test_parse_detect_shape_without_names() {
        let layout = parse_detect_shape(&[1, 84, 8400], 0).unwrap();
        assert_eq!(layout.num_classes, 80);
        assert!(!layout.transposed);

        let layout = parse_detect_shape(&[1, 8400, 84], 0).unwrap();
        assert_eq!(layout.num_classes, 80);
        assert!(layout.transposed);
    }

    #[test]
    fn test_parse_detect_shape_mismatch() {
        assert!(parse_detect_shape(&[1, 10, 8400], 80).is_err());
        assert!(parse_detect_shape(&[1, 2, 3, 4], 80).is_err());
    }

    #[test]
    fn test_two_objects_two_labels() {
        let (data, shape) = channel_major(&[
            [100.0, 100.0, 50.0, 50.0, 0.9, 0.1],
            [400.0, 400.0, 60.0, 60.0, 0.05, 0.8],
            [102.0, 101.0, 50.0, 50.0, 0.7, 0.0],
        ]);
        let result = postprocess_detect(
            &data,
            &shape,
            &identity_preprocess(640),
            &InferenceConfig::default(),
            &names(),
        )
        .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.items[0].class_id, 0);
        assert!((result.items[0].bbox[0] - 75.0).abs() < 1e-3);
        assert_eq!(result.labels().to_string(), "cat,dog");
    }

    #[test]
    fn test_low_scores_give_none() {
        let (data, shape) = channel_major(&[[100.0, 100.0, 50.0, 50.0, 0.1, 0.2]]);
        let result = postprocess_detect(
            &data,
            &shape,
            &identity_preprocess(640),
            &InferenceConfig::default(),
            &names(),
        )
        .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.labels().to_string(), "none");
    }

    #[test]
    fn test_nan_scores_handled() {
        let (data, shape) = channel_major(&[[100.0, 100.0, 50.0, 50.0, f32::NAN, 0.9]]);
        let result = postprocess_detect(
            &data,
            &shape,
            &identity_preprocess(640),
            &InferenceConfig::default(),
            &names(),
        )
        .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.items[0].class_id, 1);
    }

    #[test]
    fn test_max_detections_caps_output() {
        let (data, shape) = channel_major(&[
            [50.0, 50.0, 20.0, 20.0, 0.9, 0.0],
            [300.0, 300.0, 20.0, 20.0, 0.8, 0.0],
            [500.0, 500.0, 20.0, 20.0, 0.0, 0.95],
        ]);
        let config = InferenceConfig::default().with_max_detections(2);
        let result =
            postprocess_detect(&data, &shape, &identity_preprocess(640), &config, &names())
                .unwrap();

        assert_eq!(result.len(), 2);
        assert!((result.items[0].confidence - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_data_length_mismatch_is_error() {
        let result = postprocess_detect(
            &[0.0; 5],
            &[1, 6, 2],
            &identity_preprocess(640),
            &InferenceConfig::default(),
            &names(),
        );
        assert!(matches!(result, Err(DetectError::InferenceError(_))));
    }
}
