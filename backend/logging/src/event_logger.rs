//! Audit Event Logger
//!
//! Structured events (tool invocations, turns, failed exchanges) emitted on the
//! `sightline_events` tracing target, so the file layer writes them as NDJSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

pub const EVENT_TARGET: &str = "sightline_events";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    ToolInvoked {
        invocation_id: String,
        request_id: String,
        tool_name: String,
        arguments_json: String,
    },
    ToolCompleted {
        invocation_id: String,
        tool_name: String,
        result_json: String,
    },
    ToolFailed {
        invocation_id: String,
        tool_name: String,
        reason: String,
    },
    TurnRecorded {
        role: String,
        content: String,
    },
    ExchangeFailed {
        error_msg: String,
    },
}

impl AgentEvent {
    fn redact(&mut self) {
        match self {
            AgentEvent::ToolInvoked { arguments_json, .. } => {
                *arguments_json = redact_sensitive_data(arguments_json);
            }
            AgentEvent::ToolCompleted { result_json, .. } => {
                *result_json = redact_sensitive_data(result_json);
            }
            AgentEvent::ToolFailed { reason, .. } => {
                *reason = redact_sensitive_data(reason);
            }
            AgentEvent::TurnRecorded { content, .. } => {
                *content = redact_sensitive_data(content);
            }
            AgentEvent::ExchangeFailed { error_msg } => {
                *error_msg = redact_sensitive_data(error_msg);
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: AgentEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Redact and emit an audit event for the given conversation.
    pub fn log_event(conversation_id: &str, mut event: AgentEvent) -> EventLogEntry {
        event.redact();

        let entry = EventLogEntry {
            conversation_id: conversation_id.into(),
            timestamp: Utc::now(),
            event,
        };

        let json = serde_json::to_string(&entry).unwrap_or_else(|e| e.to_string());
        info!(target: EVENT_TARGET, event = %json, "Agent audit event");
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_redacted_before_emit() {
        let entry = EventLogger::log_event(
            "conv-1",
            AgentEvent::ToolInvoked {
                invocation_id: "inv".into(),
                request_id: "call_1".into(),
                tool_name: "detect_objects".into(),
                arguments_json: "{\"token\":\"Bearer abc.def\"}".into(),
            },
        );
        let AgentEvent::ToolInvoked { arguments_json, .. } = &entry.event else {
            panic!("wrong event variant");
        };
        assert!(!arguments_json.contains("abc.def"));
        assert_eq!(entry.conversation_id, "conv-1");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(AgentEvent::ToolFailed {
            invocation_id: "i".into(),
            tool_name: "recognize_text".into(),
            reason: "Cancelled".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "tool_failed");
    }
}
