//! Conversation state: turns, the active image, its detections, and the ledger.

use sightline_core::{ActiveImage, ImageId, NormalizedDetection, Turn, TurnRole};
use sightline_logging::{AgentEvent, EventLogger};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::detection_set::DetectionAggregator;
use crate::ledger::ToolLedger;

/// One conversation. Lives as long as the session; never destroyed explicitly.
#[derive(Debug)]
pub struct Conversation {
    pub id: String,
    turns: Vec<Turn>,
    active_image: Option<ActiveImage>,
    detections: DetectionAggregator,
    pub ledger: ToolLedger,
}

impl Conversation {
    pub fn new() -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            ledger: ToolLedger::new(id.clone()),
            id,
            turns: Vec::new(),
            active_image: None,
            detections: DetectionAggregator::new(),
        }
    }

    pub fn record_turn(&mut self, turn: Turn) {
        let role = match turn.role {
            TurnRole::User => "user",
            TurnRole::Agent => "agent",
            TurnRole::System => "system",
        };
        EventLogger::log_event(
            &self.id,
            AgentEvent::TurnRecorded {
                role: role.to_string(),
                content: turn.text.clone(),
            },
        );
        self.turns.push(turn);
    }

    /// Make `image` the active image. Returns `false` if it already was.
    ///
    /// A real swap clears the accumulated detections exactly once.
    pub fn set_active_image(&mut self, image: ActiveImage) -> bool {
        if self.active_image.as_ref().is_some_and(|current| current.id == image.id) {
            return false;
        }
        info!(
            conversation_id = %self.id,
            image_id = %image.id,
            dimensions = %image.dimensions,
            "Active image replaced"
        );
        self.active_image = Some(image);
        self.detections.reset();
        true
    }

    /// Append detections produced for `image_id`. Detections for an image
    /// that is no longer active are dropped.
    pub fn absorb(&mut self, image_id: ImageId, detections: Vec<NormalizedDetection>) -> bool {
        if self.active_image.as_ref().map(|img| img.id) != Some(image_id) {
            warn!(
                conversation_id = %self.id,
                image_id = %image_id,
                count = detections.len(),
                "Dropping detections for an inactive image"
            );
            return false;
        }
        debug!(count = detections.len(), "Aggregating detections");
        self.detections.append(detections);
        true
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn active_image(&self) -> Option<&ActiveImage> {
        self.active_image.as_ref()
    }

    pub fn detections(&self) -> &DetectionAggregator {
        &self.detections
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
