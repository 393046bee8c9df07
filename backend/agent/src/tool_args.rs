//! Typed tool calls.
//!
//! The model hands over a loose `name + string map`. Each known tool name maps
//! to one variant here; arguments are coerced leniently and anything malformed
//! falls back to the tool's default rather than failing the call.

use std::collections::BTreeMap;

use serde_json::json;
use sightline_core::{ToolError, ToolRequest, ToolSpec};

pub const DETECT_OBJECTS: &str = "detect_objects";
pub const RECOGNIZE_TEXT: &str = "recognize_text";

/// Argument keys accepted for the detector's label filter.
const LABEL_KEYS: &[&str] = &["labels", "label", "filter", "objects"];

#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    /// Empty `labels` means no filter.
    DetectObjects { labels: Vec<String> },
    RecognizeText,
}

impl ToolCall {
    pub fn from_request(request: &ToolRequest) -> Result<Self, ToolError> {
        match request.name.as_str() {
            DETECT_OBJECTS => Ok(ToolCall::DetectObjects {
                labels: label_filter(&request.arguments),
            }),
            RECOGNIZE_TEXT => Ok(ToolCall::RecognizeText),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::DetectObjects { .. } => DETECT_OBJECTS,
            ToolCall::RecognizeText => RECOGNIZE_TEXT,
        }
    }
}

/// Pull a label filter out of the argument bag.
///
/// Accepts `"dog, cat"`, `"[\"dog\", \"cat\"]"` and similar. Blank entries are
/// dropped and duplicates removed case-insensitively.
fn label_filter(arguments: &BTreeMap<String, String>) -> Vec<String> {
    let Some(raw) = LABEL_KEYS.iter().find_map(|key| arguments.get(*key)) else {
        return Vec::new();
    };

    let mut labels: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let label = part
            .trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '[' | ']'));
        if label.is_empty() || labels.iter().any(|l| l.eq_ignore_ascii_case(label)) {
            continue;
        }
        labels.push(label.to_string());
    }
    labels
}

pub fn detect_objects_spec() -> ToolSpec {
    ToolSpec {
        name: DETECT_OBJECTS.into(),
        description: "Detect objects in the current image. Returns labels, confidences, and \
                      bounding boxes in absolute pixel coordinates."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "labels": {
                    "type": "string",
                    "description": "Optional comma-separated list of object labels to look for, e.g. \"dog, bicycle\". Omit to detect everything."
                }
            }
        }),
    }
}

pub fn recognize_text_spec() -> ToolSpec {
    ToolSpec {
        name: RECOGNIZE_TEXT.into(),
        description: "Read the text in the current image. Returns each text line with its \
                      bounding box in absolute pixel coordinates, plus the full text."
            .into(),
        parameters: json!({ "type": "object", "properties": {} }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels_of(request: ToolRequest) -> Vec<String> {
        match ToolCall::from_request(&request).unwrap() {
            ToolCall::DetectObjects { labels } => labels,
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn test_comma_separated_filter() {
        let req = ToolRequest::new("1", DETECT_OBJECTS).with_arg("labels", " dog, cat ,, DOG ");
        assert_eq!(labels_of(req), ["dog", "cat"]);
    }

    #[test]
    fn test_json_array_filter_is_accepted() {
        let req = ToolRequest::new("1", DETECT_OBJECTS).with_arg("labels", r#"["person","car"]"#);
        assert_eq!(labels_of(req), ["person", "car"]);
    }

    #[test]
    fn test_malformed_or_missing_filter_means_no_filter() {
        assert!(labels_of(ToolRequest::new("1", DETECT_OBJECTS)).is_empty());
        assert!(labels_of(ToolRequest::new("1", DETECT_OBJECTS).with_arg("labels", " , [] ")).is_empty());
        assert!(labels_of(ToolRequest::new("1", DETECT_OBJECTS).with_arg("threshold", "0.5")).is_empty());
    }

    #[test]
    fn test_alias_key() {
        let req = ToolRequest::new("1", DETECT_OBJECTS).with_arg("filter", "tree");
        assert_eq!(labels_of(req), ["tree"]);
    }

    #[test]
    fn test_unknown_tool() {
        let err = ToolCall::from_request(&ToolRequest::new("1", "zoom")).unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("zoom".into()));
    }

    #[test]
    fn test_recognize_text_ignores_arguments() {
        let req = ToolRequest::new("1", RECOGNIZE_TEXT).with_arg("lang", "en");
        assert_eq!(ToolCall::from_request(&req).unwrap(), ToolCall::RecognizeText);
    }
}
