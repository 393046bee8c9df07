//! Tool invocation ledger.
//!
//! Append-only audit trail of every tool call in a conversation. Entries are
//! created `pending` and move exactly once to `success` or `error`. The ledger
//! is observability only; nothing in the control flow reads it back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sightline_core::ToolRequest;
use sightline_logging::{AgentEvent, EventLogger};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Pending,
    Success,
    Error,
}

/// One ledger entry. Args and result are kept as serialized strings.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub id: Uuid,
    /// Id of the model's tool request this entry answers.
    pub request_id: String,
    pub tool_name: String,
    pub arguments: String,
    pub status: InvocationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// How a pending invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    Success(String),
    Error(String),
}

#[derive(Debug, Default)]
pub struct ToolLedger {
    conversation_id: String,
    entries: Vec<ToolInvocation>,
}

impl ToolLedger {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            entries: Vec::new(),
        }
    }

    /// Append a pending entry for a request that is about to run.
    pub fn record(&mut self, request: &ToolRequest) -> Uuid {
        let arguments = serde_json::to_string(&request.arguments).unwrap_or_default();
        let invocation = ToolInvocation {
            id: Uuid::new_v4(),
            request_id: request.id.clone(),
            tool_name: request.name.clone(),
            arguments: arguments.clone(),
            status: InvocationStatus::Pending,
            result: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        };

        EventLogger::log_event(
            &self.conversation_id,
            AgentEvent::ToolInvoked {
                invocation_id: invocation.id.to_string(),
                request_id: invocation.request_id.clone(),
                tool_name: invocation.tool_name.clone(),
                arguments_json: arguments,
            },
        );

        let id = invocation.id;
        self.entries.push(invocation);
        id
    }

    /// Apply the single pending -> success/error transition.
    ///
    /// Returns `false` (and changes nothing) if the entry is unknown or
    /// already completed.
    pub fn resolve(&mut self, id: Uuid, outcome: InvocationOutcome) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            warn!(invocation_id = %id, "Resolve for unknown ledger entry");
            return false;
        };
        if entry.status != InvocationStatus::Pending {
            warn!(invocation_id = %id, status = ?entry.status, "Ledger entry already completed");
            return false;
        }

        entry.completed_at = Some(Utc::now());
        let event = match outcome {
            InvocationOutcome::Success(result) => {
                entry.status = InvocationStatus::Success;
                entry.result = Some(result.clone());
                AgentEvent::ToolCompleted {
                    invocation_id: id.to_string(),
                    tool_name: entry.tool_name.clone(),
                    result_json: result,
                }
            }
            InvocationOutcome::Error(reason) => {
                entry.status = InvocationStatus::Error;
                entry.error = Some(reason.clone());
                AgentEvent::ToolFailed {
                    invocation_id: id.to_string(),
                    tool_name: entry.tool_name.clone(),
                    reason,
                }
            }
        };
        EventLogger::log_event(&self.conversation_id, event);
        true
    }

    pub fn entries(&self) -> &[ToolInvocation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
