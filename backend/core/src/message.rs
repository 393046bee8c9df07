use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::image::ActiveImage;

/// Who a turn is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Agent,
    System,
}

/// A tool invocation requested by the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
}

impl ToolRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}

/// One recorded message unit. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_requests: Vec<ToolRequest>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(TurnRole::User, text.into(), Vec::new())
    }

    pub fn agent(text: impl Into<String>, tool_requests: Vec<ToolRequest>) -> Self {
        Self::new(TurnRole::Agent, text.into(), tool_requests)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(TurnRole::System, text.into(), Vec::new())
    }

    fn new(role: TurnRole, text: String, tool_requests: Vec<ToolRequest>) -> Self {
        Self {
            role,
            text,
            tool_requests,
            timestamp: Utc::now(),
        }
    }
}

/// Content of a user-initiated model turn.
#[derive(Debug, Clone)]
pub struct ModelContent {
    pub text: String,
    pub image: Option<ActiveImage>,
}

/// What the language model answered with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub tool_requests: Vec<ToolRequest>,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_requests: Vec::new(),
        }
    }

    pub fn tools(tool_requests: Vec<ToolRequest>) -> Self {
        Self {
            text: None,
            tool_requests,
        }
    }

    pub fn is_final(&self) -> bool {
        self.tool_requests.is_empty()
    }
}

/// The result for one tool request, matched back by request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub id: String,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_without_tools_is_final() {
        assert!(ModelReply::text("done").is_final());
        assert!(!ModelReply::tools(vec![ToolRequest::new("1", "recognize_text")]).is_final());
    }

    #[test]
    fn test_tool_request_arguments_default_to_empty() {
        let req: ToolRequest =
            serde_json::from_str(r#"{"id":"call_1","name":"detect_objects"}"#).unwrap();
        assert!(req.arguments.is_empty());
    }
}
