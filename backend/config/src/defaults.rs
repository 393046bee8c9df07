//! Config defaults: applies sensible default values to parsed config.

use crate::schema::SightlineConfig;

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Tool rounds per exchange.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;
pub const MAX_TOOL_ROUNDS_LIMIT: usize = 50;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_CAPABILITY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: SightlineConfig) -> SightlineConfig {
    let config = apply_model_defaults(config);
    let config = apply_agent_defaults(config);
    let config = apply_perception_defaults(config);
    apply_logging_defaults(config)
}

fn apply_model_defaults(mut config: SightlineConfig) -> SightlineConfig {
    let model = &mut config.model;
    model.provider.get_or_insert_with(|| DEFAULT_PROVIDER.to_string());
    model.model.get_or_insert_with(|| DEFAULT_MODEL.to_string());
    model.temperature.get_or_insert(DEFAULT_TEMPERATURE);
    model.max_tokens.get_or_insert(DEFAULT_MAX_TOKENS);
    model.request_timeout_secs.get_or_insert(DEFAULT_REQUEST_TIMEOUT_SECS);
    model.max_retries.get_or_insert(DEFAULT_MAX_RETRIES);
    config
}

fn apply_agent_defaults(mut config: SightlineConfig) -> SightlineConfig {
    let agent = &mut config.agent;
    agent.max_tool_rounds.get_or_insert(DEFAULT_MAX_TOOL_ROUNDS);
    agent.tool_timeout_secs.get_or_insert(DEFAULT_TOOL_TIMEOUT_SECS);
    config
}

/// Timeouts only; a capability without an endpoint stays unconfigured.
fn apply_perception_defaults(mut config: SightlineConfig) -> SightlineConfig {
    let perception = &mut config.perception;
    for cap in [&mut perception.detector, &mut perception.ocr].into_iter().flatten() {
        cap.timeout_secs.get_or_insert(DEFAULT_CAPABILITY_TIMEOUT_SECS);
    }
    config
}

fn apply_logging_defaults(mut config: SightlineConfig) -> SightlineConfig {
    let logging = &mut config.logging;
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.json.get_or_insert(false);
    config
}
