use anyhow::Result;
use async_trait::async_trait;

use crate::detection::Detection;
use crate::geometry::CoordinateSpace;
use crate::image::ActiveImage;
use crate::message::{ModelContent, ModelReply, ToolResultMessage};

/// The conversational language model, treated as an opaque request/response
/// capability. Implementations own their transport and message history.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider name (e.g., "openrouter", "mock").
    fn name(&self) -> &str;

    /// Send a user-initiated turn.
    async fn send_turn(&self, content: ModelContent) -> Result<ModelReply>;

    /// Send the results for every tool request of the previous reply, in one turn.
    async fn send_tool_results(&self, results: Vec<ToolResultMessage>) -> Result<ModelReply>;
}

/// Object-detection capability. Produces detections with `kind = Object`.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Coordinate convention this capability reports in, if it declares one.
    fn coordinate_space(&self) -> Option<CoordinateSpace>;

    /// Detect objects, optionally restricted to the given labels.
    async fn detect(&self, image: &ActiveImage, label_filter: Option<&[String]>) -> Result<Vec<Detection>>;
}

/// Text-recognition capability. Produces detections with `kind = Text`.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &str;

    fn coordinate_space(&self) -> Option<CoordinateSpace>;

    async fn recognize(&self, image: &ActiveImage) -> Result<Vec<Detection>>;
}
