//! Compact digests of tool output, in the shape sent back to the model.
//!
//! Boxes are always integer pixels of the active image and every summary names
//! its coordinate convention, so the model never has to guess a scale.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use sightline_core::{CoordinateSpace, ImageDimensions, NormalizedDetection, ToolError};

fn round_confidence(confidence: Option<f32>) -> Value {
    match confidence {
        Some(c) => json!(((c as f64) * 100.0).round() / 100.0),
        None => Value::Null,
    }
}

fn header(image: ImageDimensions, count: usize, dropped: usize) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    map.insert(
        "coordinate_space".into(),
        json!(CoordinateSpace::PixelAbsolute.to_string()),
    );
    map.insert(
        "box_format".into(),
        json!(format!(
            "[xmin, ymin, xmax, ymax] in absolute pixels of the {image} image"
        )),
    );
    map.insert(
        "image".into(),
        json!({ "width": image.width, "height": image.height }),
    );
    map.insert("count".into(), json!(count));
    map.insert("dropped".into(), json!(dropped));
    map
}

pub fn objects_summary(
    image: ImageDimensions,
    requested: &[String],
    detections: &[NormalizedDetection],
    dropped: usize,
) -> Value {
    let mut map = header(image, detections.len(), dropped);
    if !requested.is_empty() {
        map.insert("requested_labels".into(), json!(requested));
    }

    let mut per_label: BTreeMap<&str, usize> = BTreeMap::new();
    for d in detections {
        *per_label.entry(d.label.as_str()).or_default() += 1;
    }
    map.insert("counts_by_label".into(), json!(per_label));

    let objects: Vec<Value> = detections
        .iter()
        .map(|d| {
            json!({
                "label": d.label,
                "confidence": round_confidence(d.confidence),
                "box": d.bbox.rounded(),
            })
        })
        .collect();
    map.insert("objects".into(), Value::Array(objects));
    Value::Object(map)
}

pub fn text_summary(
    image: ImageDimensions,
    detections: &[NormalizedDetection],
    dropped: usize,
) -> Value {
    let mut map = header(image, detections.len(), dropped);
    let full_text = detections
        .iter()
        .map(|d| d.label.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    map.insert("full_text".into(), json!(full_text));

    let lines: Vec<Value> = detections
        .iter()
        .map(|d| {
            json!({
                "text": d.label,
                "confidence": round_confidence(d.confidence),
                "box": d.bbox.rounded(),
            })
        })
        .collect();
    map.insert("lines".into(), Value::Array(lines));
    Value::Object(map)
}

/// `{"status": "success", "tool", "summary"}`
pub fn success_envelope(tool: &str, summary: &Value) -> Value {
    json!({ "status": "success", "tool": tool, "summary": summary })
}

/// `{"status": "error", "tool", "error": {"kind", "message"}}`
pub fn error_envelope(tool: &str, error: &ToolError) -> Value {
    json!({
        "status": "error",
        "tool": tool,
        "error": { "kind": error.kind(), "message": error.to_string() },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::{BoundingBox, DetectionKind};

    fn det(label: &str, kind: DetectionKind, confidence: Option<f32>) -> NormalizedDetection {
        NormalizedDetection {
            label: label.into(),
            confidence,
            bbox: BoundingBox::new(10.4, 20.6, 110.5, 220.0),
            kind,
            image: ImageDimensions::new(640, 480),
        }
    }

    #[test]
    fn test_objects_summary_states_scale_and_counts() {
        let dets = vec![
            det("dog", DetectionKind::Object, Some(0.912)),
            det("dog", DetectionKind::Object, None),
            det("cat", DetectionKind::Object, Some(0.5)),
        ];
        let summary = objects_summary(ImageDimensions::new(640, 480), &["dog".into()], &dets, 1);

        assert_eq!(summary["coordinate_space"], "pixel_absolute");
        assert_eq!(summary["image"]["width"], 640);
        assert_eq!(summary["count"], 3);
        assert_eq!(summary["dropped"], 1);
        assert_eq!(summary["counts_by_label"]["dog"], 2);
        assert_eq!(summary["requested_labels"][0], "dog");
        assert_eq!(summary["objects"][0]["confidence"], 0.91);
        assert_eq!(summary["objects"][1]["confidence"], Value::Null);
        assert_eq!(summary["objects"][0]["box"], json!([10, 21, 111, 220]));
        assert!(summary["box_format"].as_str().unwrap().contains("640x480"));
    }

    #[test]
    fn test_text_summary_joins_lines() {
        let dets = vec![
            det("OPEN", DetectionKind::Text, Some(0.99)),
            det("9am - 5pm", DetectionKind::Text, Some(0.8)),
        ];
        let summary = text_summary(ImageDimensions::new(640, 480), &dets, 0);
        assert_eq!(summary["full_text"], "OPEN\n9am - 5pm");
        assert_eq!(summary["lines"][1]["text"], "9am - 5pm");
    }

    #[test]
    fn test_empty_summary() {
        let summary = text_summary(ImageDimensions::new(10, 10), &[], 0);
        assert_eq!(summary["count"], 0);
        assert_eq!(summary["full_text"], "");
    }

    #[test]
    fn test_error_envelope() {
        let payload = error_envelope("detect_objects", &ToolError::NoActiveImage);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error"]["kind"], "no_active_image");
    }
}
