//! Sightline runtime configuration schema.
//!
//! Typed for serde YAML/JSON with camelCase keys. Leaf fields are optional so
//! a partial file stays valid; `defaults::apply_all_defaults` fills the gaps.

use serde::{Deserialize, Serialize};
use sightline_core::CoordinateSpace;

use crate::defaults::{
    DEFAULT_CAPABILITY_TIMEOUT_SECS, DEFAULT_LOG_LEVEL, DEFAULT_MAX_RETRIES, DEFAULT_MAX_TOKENS,
    DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_MODEL, DEFAULT_PROVIDER, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_TEMPERATURE, DEFAULT_TOOL_TIMEOUT_SECS,
};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SightlineConfig {
    /// Language-model transport
    #[serde(default)]
    pub model: ModelConfig,

    /// Orchestration loop limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Perception backends
    #[serde(default)]
    pub perception: PerceptionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// "openai" | "openrouter" | "ollama" | "mock"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Transport-level retries on 429/5xx/connect errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl ModelConfig {
    pub fn provider(&self) -> &str {
        self.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Tool rounds per exchange before the loop gives up (1..=50)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_rounds: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,
    /// Replaces the generated system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl AgentConfig {
    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds.unwrap_or(DEFAULT_MAX_TOOL_ROUNDS)
    }

    pub fn tool_timeout_secs(&self) -> u64 {
        self.tool_timeout_secs.unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS)
    }
}

// ---------------------------------------------------------------------------
// Perception
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerceptionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector: Option<CapabilityConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr: Option<CapabilityConfig>,
}

/// One HTTP perception backend. Without an endpoint it is not registered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Declared output convention of the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate_space: Option<CoordinateSpace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl CapabilityConfig {
    /// The endpoint, if set and non-blank.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_CAPABILITY_TIMEOUT_SECS)
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for daily NDJSON log files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn json(&self) -> bool {
        self.json.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_yaml() {
        let yaml = r#"
model:
  provider: openrouter
  apiKey: sk-test
  maxTokens: 512
agent:
  maxToolRounds: 3
perception:
  detector:
    endpoint: http://localhost:9000/detect
    coordinateSpace: normalized0To1000
"#;
        let cfg: SightlineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.model.provider(), "openrouter");
        assert_eq!(cfg.model.max_tokens(), 512);
        assert_eq!(cfg.agent.max_tool_rounds(), 3);
        let detector = cfg.perception.detector.unwrap();
        assert_eq!(detector.coordinate_space, Some(CoordinateSpace::Normalized0To1000));
        assert!(cfg.perception.ocr.is_none());
    }

    #[test]
    fn empty_document_uses_fallbacks() {
        let cfg: SightlineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.agent.max_tool_rounds(), DEFAULT_MAX_TOOL_ROUNDS);
        assert_eq!(cfg.logging.level(), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn blank_endpoint_is_unset() {
        let cap = CapabilityConfig {
            endpoint: Some("  ".into()),
            ..Default::default()
        };
        assert!(cap.endpoint().is_none());
    }
}
