//! Object detection over an HTTP inference endpoint.
//!
//! The endpoint receives `{ image, mime_type, labels? }` with the image as
//! base64 and answers `{ coordinate_space?, detections: [{ label, score?, box }] }`.
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sightline_core::{ActiveImage, CoordinateSpace, Detection, DetectionKind, ObjectDetector};
use tracing::info;

use crate::remote::{build_client, post_json, WireBox, DEFAULT_TIMEOUT};

pub struct HttpObjectDetector {
    name: String,
    client: Client,
    endpoint: String,
    declared_space: Option<CoordinateSpace>,
}

impl HttpObjectDetector {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: "http-detector".to_string(),
            client: build_client(DEFAULT_TIMEOUT)?,
            endpoint: endpoint.into(),
            declared_space: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_coordinate_space(mut self, space: Option<CoordinateSpace>) -> Self {
        self.declared_space = space;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    coordinate_space: Option<CoordinateSpace>,
    #[serde(default)]
    detections: Vec<WireDetection>,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    label: String,
    #[serde(default, alias = "confidence")]
    score: Option<f32>,
    #[serde(rename = "box", alias = "bbox")]
    bbox: WireBox,
}

/// Convert a backend reply, applying the label filter case-insensitively in
/// case the backend ignored it.
fn into_detections(
    resp: DetectResponse,
    declared: Option<CoordinateSpace>,
    label_filter: Option<&[String]>,
) -> Vec<Detection> {
    let space = resp.coordinate_space.or(declared);
    let wanted: Option<Vec<String>> =
        label_filter.map(|labels| labels.iter().map(|l| l.to_lowercase()).collect());

    resp.detections
        .into_iter()
        .filter(|d| match &wanted {
            Some(wanted) => wanted.contains(&d.label.to_lowercase()),
            None => true,
        })
        .map(|d| Detection {
            label: d.label,
            confidence: d.score,
            bbox: d.bbox.into(),
            coordinate_space: space,
            kind: DetectionKind::Object,
        })
        .collect()
}

#[async_trait]
impl ObjectDetector for HttpObjectDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn coordinate_space(&self) -> Option<CoordinateSpace> {
        self.declared_space
    }

    async fn detect(&self, image: &ActiveImage, label_filter: Option<&[String]>) -> Result<Vec<Detection>> {
        info!(
            detector = %self.name,
            image = %image.dimensions,
            filter = ?label_filter,
            "Running object detection"
        );
        let mut body = serde_json::json!({
            "image": image.to_base64(),
            "mime_type": image.mime_type,
        });
        if let Some(labels) = label_filter {
            body["labels"] = serde_json::json!(labels);
        }

        let resp: DetectResponse = post_json(&self.client, &self.endpoint, &body).await?;
        Ok(into_detections(resp, self.declared_space, label_filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::BoundingBox;

    fn response(json: serde_json::Value) -> DetectResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_response_space_overrides_declared() {
        let resp = response(serde_json::json!({
            "coordinate_space": "normalized_0_1000",
            "detections": [{ "label": "car", "score": 0.7, "box": [10, 20, 300, 400] }]
        }));
        let out = into_detections(resp, Some(CoordinateSpace::PixelAbsolute), None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].coordinate_space, Some(CoordinateSpace::Normalized0To1000));
        assert_eq!(out[0].bbox, BoundingBox::new(10.0, 20.0, 300.0, 400.0));
        assert_eq!(out[0].confidence, Some(0.7));
    }

    #[test]
    fn test_declared_space_used_when_response_is_silent() {
        let resp = response(serde_json::json!({
            "detections": [{ "label": "car", "bbox": { "xmin": 0.1, "ymin": 0.1, "xmax": 0.2, "ymax": 0.2 } }]
        }));
        let out = into_detections(resp, Some(CoordinateSpace::Normalized01), None);
        assert_eq!(out[0].coordinate_space, Some(CoordinateSpace::Normalized01));

        let resp = response(serde_json::json!({
            "detections": [{ "label": "car", "box": [0.1, 0.1, 0.2, 0.2] }]
        }));
        assert_eq!(into_detections(resp, None, None)[0].coordinate_space, None);
    }

    #[test]
    fn test_builder_propagates_client_setup() {
        let detector = HttpObjectDetector::new("http://localhost:9000/detect")
            .and_then(|d| d.with_name("yolo").with_timeout(Duration::from_secs(3)))
            .unwrap();
        assert_eq!(detector.name(), "yolo");
        assert_eq!(detector.coordinate_space(), None);
    }

    #[test]
    fn test_label_filter_is_case_insensitive() {
        let resp = response(serde_json::json!({
            "detections": [
                { "label": "Dog", "box": [1, 1, 2, 2] },
                { "label": "cat", "box": [1, 1, 2, 2] }
            ]
        }));
        let filter = vec!["dog".to_string()];
        let out = into_detections(resp, None, Some(&filter));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "Dog");
    }
}
