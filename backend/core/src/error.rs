use thiserror::Error;

use crate::geometry::BoundingBox;

/// Failures that end a user exchange.
///
/// Only these reach the caller of the orchestrator. Everything scoped to a
/// single tool or a single detection is reported as data instead.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrchestratorError {
    /// The language-model capability failed or timed out. Fatal for the exchange.
    #[error("agent communication failed: {0}")]
    AgentCommunication(String),

    /// A user message arrived while another exchange was still in flight.
    #[error("conversation is busy with another exchange")]
    ConversationBusy,

    /// The model kept requesting tools past the configured round limit.
    #[error("tool loop exceeded {max_rounds} rounds without a final answer")]
    ToolLoopExceeded { max_rounds: usize },

    /// The caller cancelled the exchange.
    #[error("exchange cancelled")]
    Cancelled,
}

/// Failures scoped to a single tool request.
///
/// These never abort the tool loop; they are serialized into an error-shaped
/// tool result so the model can adapt.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("no image is attached to the conversation; ask the user to upload one")]
    NoActiveImage,

    #[error("capability for '{tool}' is unavailable: {reason}")]
    CapabilityUnavailable { tool: String, reason: String },

    #[error("'{tool}' failed: {message}")]
    CapabilityFailed { tool: String, message: String },

    #[error("'{tool}' timed out after {secs}s")]
    TimedOut { tool: String, secs: u64 },

    #[error("Cancelled")]
    Cancelled,
}

impl ToolError {
    /// Stable machine-readable tag sent to the model alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::NoActiveImage => "no_active_image",
            ToolError::CapabilityUnavailable { .. } => "capability_unavailable",
            ToolError::CapabilityFailed { .. } => "capability_failed",
            ToolError::TimedOut { .. } => "timed_out",
            ToolError::Cancelled => "cancelled",
        }
    }
}

/// A box collapsed to zero (or negative) area after clamping to the image.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("degenerate box for '{label}': [{}, {}, {}, {}]", bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax)]
pub struct DegenerateBoxError {
    pub label: String,
    pub bbox: BoundingBox,
}
