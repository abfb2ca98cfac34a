// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Box overlap helpers.

use crate::results::Detection;

/// Intersection over Union of two `[x1, y1, x2, y2]` boxes, in `[0, 1]`.
#[must_use]
pub fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);

    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 { intersection / union } else { 0.0 }
}

/// Per-class non-maximum suppression.
///
/// Returns indices into `candidates`, highest confidence first. A box is only
/// suppressed by a higher-scoring box of the same class whose `IoU` exceeds
/// `iou_threshold`.
#[must_use]
pub fn nms_per_class(candidates: &[Detection], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .confidence
            .total_cmp(&candidates[a].confidence)
    });

    let mut keep: Vec<usize> = Vec::new();
    for &i in &order {
        let current = &candidates[i];
        let suppressed = keep.iter().any(|&k| {
            let kept = &candidates[k];
            kept.class_id == current.class_id
                && calculate_iou(&kept.bbox, &current.bbox) > iou_threshold
        });
        if !suppressed {
            keep.push(i);
        }
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_iou() {
        let box1 = [0.0, 0.0, 10.0, 10.0];
        let box2 = [5.0, 5.0, 15.0, 15.0];
        let iou = calculate_iou(&box1, &box2);
        assert!((iou - 0.142_857).abs() < 0.001); // 25 / (100 + 100 - 25)
    }

    #[test]
    fn test_iou_degenerate_box() {
        let point = [5.0, 5.0, 5.0, 5.0];
        assert!(calculate_iou(&point, &point).abs() < f32::EPSILON);
    }

    #[test]
    fn test_nms_keeps_other_classes() {
        let candidates = vec![
            Detection::new([0.0, 0.0, 10.0, 10.0], 0.9, 0),
            Detection::new([1.0, 1.0, 11.0, 11.0], 0.8, 1),
            Detection::new([100.0, 100.0, 110.0, 110.0], 0.95, 0),
        ];
        let keep = nms_per_class(&candidates, 0.5);
        assert_eq!(keep, vec![2, 0, 1]);
    }

    #[test]
    fn test_nms_suppresses_same_class() {
        let candidates = vec![
            Detection::new([1.0, 1.0, 11.0, 11.0], 0.8, 0),
            Detection::new([0.0, 0.0, 10.0, 10.0], 0.9, 0),
        ];
        let keep = nms_per_class(&candidates, 0.5);
        assert_eq!(keep, vec![1]);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms_per_class(&[], 0.5).is_empty());
    }
}
