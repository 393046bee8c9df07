pub mod detection;
pub mod error;
pub mod geometry;
pub mod image;
pub mod message;
pub mod tools;
pub mod traits;

pub use detection::{Detection, DetectionKind, NormalizedDetection};
pub use error::{DegenerateBoxError, OrchestratorError, ToolError};
pub use geometry::{BoundingBox, CoordinateSpace, ImageDimensions};
pub use image::{ActiveImage, ImageId};
pub use message::{ModelContent, ModelReply, ToolRequest, ToolResultMessage, Turn, TurnRole};
pub use tools::ToolSpec;
pub use traits::{LanguageModel, ObjectDetector, TextRecognizer};
