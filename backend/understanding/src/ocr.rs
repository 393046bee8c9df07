//! Optical Character Recognition (OCR)
//!
//! Sends the image to a text-recognition endpoint and turns each recognized
//! line into a `Text` detection whose label is the line's content.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sightline_core::{ActiveImage, CoordinateSpace, Detection, DetectionKind, TextRecognizer};
use tracing::info;

use crate::remote::{build_client, post_json, WireBox, DEFAULT_TIMEOUT};

pub struct HttpTextRecognizer {
    name: String,
    client: Client,
    endpoint: String,
    declared_space: Option<CoordinateSpace>,
}

impl HttpTextRecognizer {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: "http-ocr".to_string(),
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
struct RecognizeResponse {
    #[serde(default)]
    coordinate_space: Option<CoordinateSpace>,
    #[serde(default)]
    lines: Vec<WireLine>,
}

#[derive(Debug, Deserialize)]
struct WireLine {
    text: String,
    #[serde(default, alias = "score")]
    confidence: Option<f32>,
    #[serde(rename = "box", alias = "bbox")]
    bbox: WireBox,
}

fn into_detections(resp: RecognizeResponse, declared: Option<CoordinateSpace>) -> Vec<Detection> {
    let space = resp.coordinate_space.or(declared);
    resp.lines
        .into_iter()
        .filter(|line| !line.text.trim().is_empty())
        .map(|line| Detection {
            label: line.text.trim().to_string(),
            confidence: line.confidence,
            bbox: line.bbox.into(),
            coordinate_space: space,
            kind: DetectionKind::Text,
        })
        .collect()
}

#[async_trait]
impl TextRecognizer for HttpTextRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn coordinate_space(&self) -> Option<CoordinateSpace> {
        self.declared_space
    }

    async fn recognize(&self, image: &ActiveImage) -> Result<Vec<Detection>> {
        info!(recognizer = %self.name, image = %image.dimensions, "Running OCR");
        let body = serde_json::json!({
            "image": image.to_base64(),
            "mime_type": image.mime_type,
        });
        let resp: RecognizeResponse = post_json(&self.client, &self.endpoint, &body).await?;
        Ok(into_detections(resp, self.declared_space))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_become_text_detections() {
        let resp: RecognizeResponse = serde_json::from_value(serde_json::json!({
            "lines": [
                { "text": "  OPEN 24H ", "confidence": 0.88, "box": [5, 5, 120, 30] },
                { "text": "   ", "box": [0, 0, 1, 1] }
            ]
        }))
        .unwrap();
        let out = into_detections(resp, Some(CoordinateSpace::PixelAbsolute));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "OPEN 24H");
        assert_eq!(out[0].kind, DetectionKind::Text);
        assert_eq!(out[0].coordinate_space, Some(CoordinateSpace::PixelAbsolute));
    }
}
