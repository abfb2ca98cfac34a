// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Detection results and the label set printed for the caller.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Token printed when no object was detected.
pub const NONE_SENTINEL: &str = "none";

/// Separator between labels on the output line.
pub const LABEL_SEPARATOR: char = ',';

/// Timing information for one image (in milliseconds).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Speed {
    /// Time spent on preprocessing.
    pub preprocess: f64,
    /// Time spent in the forward pass.
    pub inference: f64,
    /// Time spent on decoding and NMS.
    pub postprocess: f64,
}

impl Speed {
    /// Sum of all stages.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess + self.inference + self.postprocess
    }
}

/// A single detected object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Box in original image pixels, `[x1, y1, x2, y2]`.
    pub bbox: [f32; 4],
    /// Class score of the winning class.
    pub confidence: f32,
    /// Index into the model's label table.
    pub class_id: usize,
}

impl Detection {
    /// Create a detection.
    #[must_use]
    pub const fn new(bbox: [f32; 4], confidence: f32, class_id: usize) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }

}

/// All detections for one image, with the label table needed to name them.
#[derive(Debug, Clone, Default)]
pub struct Detections {
    /// Kept detections, highest confidence first.
    pub items: Vec<Detection>,
    /// Class index to label mapping.
    pub names: HashMap<usize, String>,
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
    /// Stage timings.
    pub speed: Speed,
}

impl Detections {
    /// Create an empty result for an image of `orig_shape`.
    #[must_use]
    pub fn empty(names: HashMap<usize, String>, orig_shape: (u32, u32)) -> Self {
        Self {
            items: Vec::new(),
            names,
            orig_shape,
            speed: Speed::default(),
        }
    }

    /// Number of detections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was detected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Label for a class index; unknown indices fall back to the index itself.
    #[must_use]
    pub fn label(&self, class_id: usize) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }

    /// Unique labels of all detections.
    #[must_use]
    pub fn labels(&self) -> LabelSet {
        self.items.iter().map(|d| self.label(d.class_id)).collect()
    }

    /// Per-class counts such as "2 cats, 1 dog", ordered by class index.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "(no detections)".to_string();
        }

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for d in &self.items {
            *counts.entry(d.class_id).or_insert(0) += 1;
        }

        let mut sorted: Vec<(usize, usize)> = counts.into_iter().collect();
        sorted.sort_by_key(|(class_id, _)| *class_id);

        sorted
            .iter()
            .map(|(class_id, count)| {
                let name = self.label(*class_id);
                let suffix = if *count > 1 { "s" } else { "" };
                format!("{count} {name}{suffix}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Deduplicated labels, kept in lexical order so the printed line is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(BTreeSet<String>);

impl LabelSet {
    /// Whether the label is present.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    /// Number of distinct labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no label was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate labels in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for LabelSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Renders the output line: comma-joined labels, or the `none` sentinel.
impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str(NONE_SENTINEL);
        }
        for (i, label) in self.iter().enumerate() {
            if i > 0 {
                write!(f, "{LABEL_SEPARATOR}")?;
            }
            f.write_str(label)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> HashMap<usize, String> {
        HashMap::from([
            (0, "dog".to_string()),
            (1, "cat".to_string()),
            (2, "bird".to_string()),
        ])
    }

    fn detections(classes: &[usize]) -> Detections {
        let mut result = Detections::empty(names(), (480, 640));
        result.items = classes
            .iter()
            .map(|&c| Detection::new([0.0, 0.0, 10.0, 10.0], 0.9, c))
            .collect();
        result
    }

    #[test]
    fn test_single_label() {
        assert_eq!(detections(&[1]).labels().to_string(), "cat");
    }

    #[test]
    fn test_labels_deduplicated_and_sorted() {
        let labels = detections(&[1, 0, 1, 0, 1]).labels();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.to_string(), "cat,dog");
    }

    #[test]
    fn test_empty_prints_sentinel() {
        let labels = detections(&[]).labels();
        assert!(labels.is_empty());
        assert_eq!(labels.to_string(), NONE_SENTINEL);
    }

    #[test]
    fn test_unknown_class_uses_index() {
        let labels = detections(&[7, 2]).labels();
        assert!(labels.contains("7"));
        assert!(labels.contains("bird"));
    }

    #[test]
    fn test_summary_counts() {
        assert_eq!(detections(&[1, 0, 1]).summary(), "1 dog, 2 cats");
        assert_eq!(detections(&[]).summary(), "(no detections)");
    }

    #[test]
    fn test_speed_total() {
        let speed = Speed {
            preprocess: 1.5,
            inference: 20.0,
            postprocess: 0.5,
        };
        assert!((speed.total() - 22.0).abs() < 1e-9);
    }
}
