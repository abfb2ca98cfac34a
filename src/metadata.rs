// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Model metadata embedded in exported ONNX files.
//!
//! Ultralytics exports write one custom metadata property per key (`task`,
//! `stride`, `imgsz`, `names`, ...). Values are YAML scalars or Python
//! literals, so only the handful of shapes the exporter emits are parsed here.

use std::collections::HashMap;

use crate::error::{DetectError, Result};
use crate::results::{LABEL_SEPARATOR, NONE_SENTINEL};

/// Keys looked up in the ONNX custom metadata.
pub const METADATA_KEYS: [&str; 13] = [
    "description",
    "author",
    "date",
    "version",
    "license",
    "docs",
    "stride",
    "task",
    "batch",
    "imgsz",
    "names",
    "half",
    "channels",
];

/// Task name written by the exporter for detection models.
pub const DETECT_TASK: &str = "detect";

/// Metadata describing a detection model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    /// Free-form description, e.g. "Ultralytics YOLO11n model trained on data.yaml".
    pub description: String,
    /// Exporter version.
    pub version: String,
    /// Task the model was trained for.
    pub task: String,
    /// Network stride.
    pub stride: u32,
    /// Input image size as (height, width).
    pub imgsz: (usize, usize),
    /// Class index to label mapping.
    pub names: HashMap<usize, String>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            version: String::new(),
            task: DETECT_TASK.to_string(),
            stride: 32,
            imgsz: (640, 640),
            names: HashMap::new(),
        }
    }
}

impl ModelMetadata {
    /// Build metadata from per-key properties as read from the ONNX session.
    ///
    /// Unknown keys are ignored and absent keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelLoadError`] if a numeric field is malformed.
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let mut metadata = Self::default();

        for (key, raw) in props {
            let value = unquote(raw);
            match key.as_str() {
                "description" => metadata.description = value.to_string(),
                "version" => metadata.version = value.to_string(),
                "task" => metadata.task = value.to_lowercase(),
                "stride" => {
                    metadata.stride = value.parse().map_err(|_| {
                        DetectError::ModelLoadError(format!("invalid stride in metadata: {value}"))
                    })?;
                }
                "imgsz" => metadata.imgsz = parse_imgsz(raw)?,
                "names" => metadata.names = parse_names(raw),
                _ => {}
            }
        }

        Ok(metadata)
    }

    /// Parse a combined YAML document holding all keys.
    ///
    /// Older exports store everything under one property; nested `names:` and
    /// `imgsz:` blocks are folded back into single values before parsing.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelLoadError`] if a numeric field is malformed.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut props: HashMap<String, String> = HashMap::new();
        let mut current: Option<String> = None;

        for line in yaml.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let indented = line.starts_with(' ') || line.starts_with('\t');
            if (indented || trimmed.starts_with('-'))
                && let Some(key) = &current
            {
                let entry = props.entry(key.clone()).or_default();
                entry.push('\n');
                entry.push_str(trimmed);
                continue;
            }

            if let Some((key, value)) = trimmed.split_once(':') {
                let key = key.trim().to_string();
                props.insert(key.clone(), value.trim().to_string());
                current = Some(key);
            }
        }

        Self::from_properties(&props)
    }

    /// Fail unless the model was exported for object detection and every
    /// label can be printed unambiguously on the output line.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::ModelLoadError`] for any other task, or for a
    /// label that is empty, equal to the `none` sentinel, or contains the
    /// separator or a line break.
    pub fn ensure_detect(&self) -> Result<()> {
        if self.task != DETECT_TASK {
            return Err(DetectError::ModelLoadError(format!(
                "expected a '{DETECT_TASK}' model, found task '{}'",
                self.task
            )));
        }

        let mut ids: Vec<&usize> = self.names.keys().collect();
        ids.sort_unstable();
        for id in ids {
            let label = &self.names[id];
            let unprintable = label.trim().is_empty()
                || label == NONE_SENTINEL
                || label.contains(LABEL_SEPARATOR)
                || label.contains(['\n', '\r']);
            if unprintable {
                return Err(DetectError::ModelLoadError(format!(
                    "class {id} has label {label:?}, which cannot be printed as a result"
                )));
            }
        }

        Ok(())
    }

    /// Number of classes in the label table.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('\'').trim_matches('"')
}

/// Parse `[640, 640]`, `640` or a YAML list (`- 640` lines).
fn parse_imgsz(raw: &str) -> Result<(usize, usize)> {
    let values: Vec<usize> = raw
        .split(|c: char| c == ',' || c == '\n')
        .map(|s| s.trim().trim_matches(|c: char| c == '[' || c == ']' || c == '-').trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| {
                DetectError::ModelLoadError(format!("invalid imgsz in metadata: {}", raw.trim()))
            })
        })
        .collect::<Result<_>>()?;

    match values.as_slice() {
        [] => Ok(ModelMetadata::default().imgsz),
        [side] => Ok((*side, *side)),
        [h, w, ..] => Ok((*h, *w)),
    }
}

/// Parse `{0: 'cat', 1: 'dog'}` or YAML `0: cat` lines. Entries without a
/// numeric index are skipped.
fn parse_names(raw: &str) -> HashMap<usize, String> {
    let body = raw.trim();
    let body = body
        .strip_prefix('{')
        .and_then(|b| b.strip_suffix('}'))
        .unwrap_or(body);

    split_entries(body)
        .filter_map(|entry| {
            let (key, value) = entry.split_once(':')?;
            let class_id = key.trim().parse::<usize>().ok()?;
            Some((class_id, unquote(value).to_string()))
        })
        .collect()
}

/// Split dict entries on commas and newlines outside of quotes, so labels
/// such as `'hot dog, large'` survive intact.
fn split_entries(body: &str) -> impl Iterator<Item = &str> {
    let mut entries = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            (None, ',' | '\n') => {
                entries.push(&body[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    entries.push(&body[start..]);

    entries.into_iter().filter(|e| !e.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_METADATA: &str = r"
description: Ultralytics YOLO11n model trained on data.yaml
author: Ultralytics
version: 8.3.236
stride: 32
task: detect
batch: 1
imgsz:
- 640
- 480
names:
  0: cat
  1: dog
  2: bird
";

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_yaml_document() {
        let metadata = ModelMetadata::from_yaml_str(SAMPLE_METADATA).unwrap();

        assert_eq!(metadata.task, "detect");
        assert_eq!(metadata.stride, 32);
        assert_eq!(metadata.imgsz, (640, 480));
        assert_eq!(metadata.version, "8.3.236");
        assert_eq!(metadata.num_classes(), 3);
        assert_eq!(metadata.names[&0], "cat");
        assert_eq!(metadata.names[&2], "bird");
        assert!(metadata.ensure_detect().is_ok());
    }

    #[test]
    fn test_parse_exporter_properties() {
        let metadata = ModelMetadata::from_properties(&props(&[
            ("task", "detect"),
            ("stride", "32"),
            ("imgsz", "[416, 416]"),
            ("names", "{0: 'cat', 1: 'dog', 2: 'hot dog, large'}"),
        ]))
        .unwrap();

        assert_eq!(metadata.imgsz, (416, 416));
        assert_eq!(metadata.names[&1], "dog");
        assert_eq!(metadata.names[&2], "hot dog, large");
    }

    #[test]
    fn test_ambiguous_labels_rejected() {
        for names in [
            "{0: 'cat', 1: 'none'}",
            "{0: 'cat', 1: ''}",
            "{0: 'cat', 1: 'hot dog, large'}",
        ] {
            let metadata =
                ModelMetadata::from_properties(&props(&[("task", "detect"), ("names", names)]))
                    .unwrap();
            assert!(
                matches!(metadata.ensure_detect(), Err(DetectError::ModelLoadError(_))),
                "{names} should be rejected"
            );
        }
    }

    #[test]
    fn test_plain_labels_accepted() {
        let metadata = ModelMetadata::from_properties(&props(&[
            ("task", "detect"),
            ("names", "{0: 'cat', 1: 'traffic light', 2: 'nonexistent'}"),
        ]))
        .unwrap();
        assert!(metadata.ensure_detect().is_ok());
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let metadata = ModelMetadata::from_properties(&HashMap::new()).unwrap();
        assert_eq!(metadata, ModelMetadata::default());
        assert_eq!(metadata.imgsz, (640, 640));
    }

    #[test]
    fn test_scalar_imgsz() {
        let metadata = ModelMetadata::from_properties(&props(&[("imgsz", "320")])).unwrap();
        assert_eq!(metadata.imgsz, (320, 320));
    }

    #[test]
    fn test_malformed_stride_is_load_error() {
        let err = ModelMetadata::from_properties(&props(&[("stride", "wide")])).unwrap_err();
        assert!(matches!(err, DetectError::ModelLoadError(_)));
    }

    #[test]
    fn test_non_detect_task_rejected() {
        let metadata = ModelMetadata::from_properties(&props(&[("task", "segment")])).unwrap();
        assert!(matches!(
            metadata.ensure_detect(),
            Err(DetectError::ModelLoadError(_))
        ));
    }
}
