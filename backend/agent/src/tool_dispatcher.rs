//! Dispatcher for the model's tool requests.
//!
//! Routes a request to its perception capability, normalizes what comes back,
//! and wraps the outcome in a uniform envelope. Failures never escape as
//! errors: they become an error-shaped result the model can react to.

use std::time::Instant;

use serde_json::Value;
use sightline_core::{
    ActiveImage, CoordinateSpace, Detection, NormalizedDetection, ToolError, ToolRequest, ToolSpec,
};
use sightline_understanding::{CapabilityRegistry, normalize_all};
use tracing::{debug, info, warn};

use crate::summary;
use crate::tool_args::{
    DETECT_OBJECTS, RECOGNIZE_TEXT, ToolCall, detect_objects_spec, recognize_text_spec,
};

/// Successful tool output.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Pixel-space detections, in capability order.
    pub detections: Vec<NormalizedDetection>,
    /// Boxes dropped as degenerate during normalization.
    pub dropped: usize,
    /// Digest serialized back to the model.
    pub summary: Value,
}

/// Result of one tool request, keyed by the request id.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub request_id: String,
    pub tool: String,
    pub outcome: Result<ToolOutput, ToolError>,
}

impl ToolResult {
    pub fn failed(request: &ToolRequest, error: ToolError) -> Self {
        Self {
            request_id: request.id.clone(),
            tool: request.name.clone(),
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The envelope sent back to the model for this request.
    pub fn payload(&self) -> Value {
        match &self.outcome {
            Ok(output) => summary::success_envelope(&self.tool, &output.summary),
            Err(err) => summary::error_envelope(&self.tool, err),
        }
    }
}

/// Tool specs for the capabilities present in `registry`.
pub fn registered_tools(registry: &CapabilityRegistry) -> Vec<ToolSpec> {
    let mut specs = Vec::new();
    if registry.detector().is_some() {
        specs.push(detect_objects_spec());
    }
    if registry.recognizer().is_some() {
        specs.push(recognize_text_spec());
    }
    specs
}

pub struct ToolDispatcher {
    registry: CapabilityRegistry,
}

impl ToolDispatcher {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        registered_tools(&self.registry)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tool_specs().into_iter().map(|spec| spec.name).collect()
    }

    /// Dispatch one request against the active image.
    pub async fn dispatch(&self, request: &ToolRequest, image: Option<&ActiveImage>) -> ToolResult {
        let start = Instant::now();
        let outcome = match image {
            None => Err(ToolError::NoActiveImage),
            Some(image) => match ToolCall::from_request(request) {
                Ok(call) => self.run(&call, image).await,
                Err(err) => Err(err),
            },
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(output) => info!(
                tool = %request.name,
                request_id = %request.id,
                detections = output.detections.len(),
                dropped = output.dropped,
                elapsed_ms,
                "Tool succeeded"
            ),
            Err(err) => warn!(
                tool = %request.name,
                request_id = %request.id,
                kind = err.kind(),
                error = %err,
                elapsed_ms,
                "Tool failed"
            ),
        }

        ToolResult {
            request_id: request.id.clone(),
            tool: request.name.clone(),
            outcome,
        }
    }

    async fn run(&self, call: &ToolCall, image: &ActiveImage) -> Result<ToolOutput, ToolError> {
        let tool = call.name();
        let unavailable = |reason: String| ToolError::CapabilityUnavailable {
            tool: tool.to_string(),
            reason,
        };
        let failed = |e: anyhow::Error| ToolError::CapabilityFailed {
            tool: tool.to_string(),
            message: format!("{e:#}"),
        };

        let (raw, declared) = match call {
            ToolCall::DetectObjects { labels } => {
                let handle = self
                    .registry
                    .detector()
                    .ok_or_else(|| ToolError::UnknownTool(DETECT_OBJECTS.to_string()))?;
                let detector = handle.get().await.map_err(unavailable)?;
                let filter = (!labels.is_empty()).then_some(labels.as_slice());
                debug!(capability = detector.name(), filter = ?filter, "Running object detection");
                let raw = detector.detect(image, filter).await.map_err(failed)?;
                (raw, detector.coordinate_space())
            }
            ToolCall::RecognizeText => {
                let handle = self
                    .registry
                    .recognizer()
                    .ok_or_else(|| ToolError::UnknownTool(RECOGNIZE_TEXT.to_string()))?;
                let recognizer = handle.get().await.map_err(unavailable)?;
                debug!(capability = recognizer.name(), "Running text recognition");
                let raw = recognizer.recognize(image).await.map_err(failed)?;
                (raw, recognizer.coordinate_space())
            }
        };

        let raw = declare_space(raw, declared);
        let batch = normalize_all(&raw, image.dimensions);
        let dropped = batch.dropped.len();
        let summary = match call {
            ToolCall::DetectObjects { labels } => {
                summary::objects_summary(image.dimensions, labels, &batch.detections, dropped)
            }
            ToolCall::RecognizeText => summary::text_summary(image.dimensions, &batch.detections, dropped),
        };

        Ok(ToolOutput {
            detections: batch.detections,
            dropped,
            summary,
        })
    }
}

/// Stamp the capability's declared space onto detections that carry none.
fn declare_space(mut detections: Vec<Detection>, declared: Option<CoordinateSpace>) -> Vec<Detection> {
    if let Some(space) = declared {
        for d in detections.iter_mut().filter(|d| d.coordinate_space.is_none()) {
            d.coordinate_space = Some(space);
        }
    }
    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use futures::FutureExt;
    use sightline_core::{BoundingBox, DetectionKind, ImageDimensions, ObjectDetector, TextRecognizer};
    use sightline_understanding::CapabilityHandle;
    use std::sync::Mutex;

    /// Reports fractions but leaves each detection undeclared.
    struct FractionDetector {
        seen_filter: Mutex<Option<Vec<String>>>,
    }

    #[async_trait]
    impl ObjectDetector for FractionDetector {
        fn name(&self) -> &str {
            "fractions"
        }
        fn coordinate_space(&self) -> Option<CoordinateSpace> {
            Some(CoordinateSpace::Normalized01)
        }
        async fn detect(&self, _image: &ActiveImage, filter: Option<&[String]>) -> Result<Vec<Detection>> {
            *self.seen_filter.lock().unwrap() = filter.map(|f| f.to_vec());
            Ok(vec![
                Detection::object("dog", BoundingBox::new(0.5, 0.5, 1.0, 1.0), CoordinateSpace::Normalized01)
                    .undeclared()
                    .with_confidence(0.88),
                // collapses to zero width
                Detection::object("speck", BoundingBox::new(0.2, 0.2, 0.2, 0.4), CoordinateSpace::Normalized01)
                    .undeclared(),
            ])
        }
    }

    struct BrokenOcr;

    #[async_trait]
    impl TextRecognizer for BrokenOcr {
        fn name(&self) -> &str {
            "broken"
        }
        fn coordinate_space(&self) -> Option<CoordinateSpace> {
            None
        }
        async fn recognize(&self, _image: &ActiveImage) -> Result<Vec<Detection>> {
            bail!("model weights missing")
        }
    }

    fn image() -> ActiveImage {
        ActiveImage::new(vec![1u8, 2, 3], "image/jpeg", ImageDimensions::new(800, 600))
    }

    fn dispatcher() -> (ToolDispatcher, Arc<FractionDetector>) {
        let detector = Arc::new(FractionDetector {
            seen_filter: Mutex::new(None),
        });
        let registry = CapabilityRegistry::new()
            .with_detector(CapabilityHandle::ready("fractions", detector.clone() as Arc<dyn ObjectDetector>))
            .with_recognizer(CapabilityHandle::ready("broken", Arc::new(BrokenOcr) as Arc<dyn TextRecognizer>));
        (ToolDispatcher::new(registry), detector)
    }

    #[tokio::test]
    async fn test_detect_normalizes_and_drops_degenerate() {
        let (dispatcher, detector) = dispatcher();
        let img = image();
        let request = ToolRequest::new("call_1", DETECT_OBJECTS).with_arg("labels", "dog");

        let result = dispatcher.dispatch(&request, Some(&img)).await;
        let output = result.outcome.as_ref().unwrap();

        assert_eq!(output.detections.len(), 1);
        assert_eq!(output.detections[0].bbox, BoundingBox::new(400.0, 300.0, 800.0, 600.0));
        assert_eq!(output.detections[0].kind, DetectionKind::Object);
        assert_eq!(output.dropped, 1);
        assert_eq!(detector.seen_filter.lock().unwrap().as_deref(), Some(&["dog".to_string()][..]));

        let payload = result.payload();
        assert_eq!(payload["status"], "success");
        assert_eq!(payload["summary"]["objects"][0]["box"], serde_json::json!([400, 300, 800, 600]));
    }

    #[tokio::test]
    async fn test_no_image_is_reported_as_data() {
        let (dispatcher, _) = dispatcher();
        let result = dispatcher.dispatch(&ToolRequest::new("c", RECOGNIZE_TEXT), None).await;
        assert_eq!(result.outcome.unwrap_err(), ToolError::NoActiveImage);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (dispatcher, _) = dispatcher();
        let img = image();
        let result = dispatcher.dispatch(&ToolRequest::new("c", "segment"), Some(&img)).await;
        assert_eq!(result.payload()["error"]["kind"], "unknown_tool");
    }

    #[tokio::test]
    async fn test_unregistered_capability_is_unknown() {
        let dispatcher = ToolDispatcher::new(CapabilityRegistry::new());
        let img = image();
        let result = dispatcher.dispatch(&ToolRequest::new("c", DETECT_OBJECTS), Some(&img)).await;
        assert_eq!(result.outcome.unwrap_err(), ToolError::UnknownTool(DETECT_OBJECTS.into()));
        assert!(dispatcher.tool_names().is_empty());
    }

    #[tokio::test]
    async fn test_capability_error_is_wrapped() {
        let (dispatcher, _) = dispatcher();
        let img = image();
        let result = dispatcher.dispatch(&ToolRequest::new("c", RECOGNIZE_TEXT), Some(&img)).await;
        let payload = result.payload();
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error"]["kind"], "capability_failed");
        assert!(payload["error"]["message"].as_str().unwrap().contains("model weights missing"));
    }

    #[tokio::test]
    async fn test_failed_lazy_capability_is_unavailable() {
        let registry = CapabilityRegistry::new().with_detector(CapabilityHandle::lazy("yolo", || {
            async { Err::<Arc<dyn ObjectDetector>, _>(anyhow::anyhow!("no GPU")) }.boxed()
        }));
        let dispatcher = ToolDispatcher::new(registry);
        let img = image();
        let result = dispatcher.dispatch(&ToolRequest::new("c", DETECT_OBJECTS), Some(&img)).await;
        assert_eq!(
            result.outcome.unwrap_err(),
            ToolError::CapabilityUnavailable {
                tool: DETECT_OBJECTS.into(),
                reason: "no GPU".into()
            }
        );
    }

    #[test]
    fn test_tool_names_follow_registry() {
        let (dispatcher, _) = dispatcher();
        assert_eq!(dispatcher.tool_names(), [DETECT_OBJECTS, RECOGNIZE_TEXT]);
    }

    #[test]
    fn test_declared_space_does_not_override_detection() {
        let dets = vec![Detection::object("x", BoundingBox::new(1.0, 1.0, 2.0, 2.0), CoordinateSpace::PixelAbsolute)];
        let stamped = declare_space(dets, Some(CoordinateSpace::Normalized0To1000));
        assert_eq!(stamped[0].coordinate_space, Some(CoordinateSpace::PixelAbsolute));
    }
}
