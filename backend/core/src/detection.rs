use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, CoordinateSpace, ImageDimensions};

/// What produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    Object,
    Text,
}

/// A raw detection as returned by a perception capability.
///
/// `coordinate_space` is `None` when the producer did not declare its
/// convention; the normalizer then falls back to a best-effort guess.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate_space: Option<CoordinateSpace>,
    pub kind: DetectionKind,
}

impl Detection {
    pub fn object(label: impl Into<String>, bbox: BoundingBox, space: CoordinateSpace) -> Self {
        Self {
            label: label.into(),
            confidence: None,
            bbox,
            coordinate_space: Some(space),
            kind: DetectionKind::Object,
        }
    }

    pub fn text(text: impl Into<String>, bbox: BoundingBox, space: CoordinateSpace) -> Self {
        Self {
            label: text.into(),
            confidence: None,
            bbox,
            coordinate_space: Some(space),
            kind: DetectionKind::Text,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Clears the declared space, as an unannotated legacy producer would.
    pub fn undeclared(mut self) -> Self {
        self.coordinate_space = None;
        self
    }
}

/// A detection expressed in absolute pixels of the image it was produced for.
///
/// Always satisfies `0 <= xmin < xmax <= width` and `0 <= ymin < ymax <= height`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDetection {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub kind: DetectionKind,
    /// Image size the box was normalized against.
    pub image: ImageDimensions,
}

impl NormalizedDetection {
    pub fn coordinate_space(&self) -> CoordinateSpace {
        CoordinateSpace::PixelAbsolute
    }

    /// Converts back into a raw detection declared as pixel-absolute.
    pub fn to_detection(&self) -> Detection {
        Detection {
            label: self.label.clone(),
            confidence: self.confidence,
            bbox: self.bbox,
            coordinate_space: Some(CoordinateSpace::PixelAbsolute),
            kind: self.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_wire_shape() {
        let d = Detection::object("dog", BoundingBox::new(0.1, 0.2, 0.3, 0.4), CoordinateSpace::Normalized01)
            .with_confidence(0.9);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["box"]["xmin"], 0.1);
        assert_eq!(json["coordinate_space"], "normalized_0_1");
        assert_eq!(json["kind"], "object");
    }

    #[test]
    fn test_undeclared_space_deserializes_as_none() {
        let d: Detection = serde_json::from_value(serde_json::json!({
            "label": "STOP",
            "box": { "xmin": 1.0, "ymin": 2.0, "xmax": 3.0, "ymax": 4.0 },
            "kind": "text"
        }))
        .unwrap();
        assert!(d.coordinate_space.is_none());
        assert_eq!(d.kind, DetectionKind::Text);
    }
}
