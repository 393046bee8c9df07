//! Config validation: schema checks with user-friendly error messages.

use crate::defaults::MAX_TOOL_ROUNDS_LIMIT;
use crate::schema::{CapabilityConfig, SightlineConfig};
use thiserror::Error;

/// Providers `build_model` knows how to construct.
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "mock"];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &SightlineConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_model(config, &mut report);
    validate_agent(config, &mut report);
    validate_perception(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_model(config: &SightlineConfig, report: &mut ValidationReport) {
    let model = &config.model;
    let provider = model.provider();
    if !KNOWN_PROVIDERS.contains(&provider) {
        report.error(
            "model.provider",
            format!("Unknown provider '{provider}'. Use one of: {}", KNOWN_PROVIDERS.join(", ")),
        );
    }
    if matches!(provider, "openai" | "openrouter")
        && model.api_key.as_deref().map(str::is_empty).unwrap_or(true)
    {
        report.warn("model.apiKey", format!("No API key set; {provider} requests will be rejected"));
    }
    if let Some(t) = model.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.error("model.temperature", "temperature must be within 0.0..=2.0");
        }
    }
    if model.max_tokens == Some(0) {
        report.error("model.maxTokens", "maxTokens must be > 0");
    }
    if model.request_timeout_secs == Some(0) {
        report.error("model.requestTimeoutSecs", "requestTimeoutSecs must be > 0");
    }
    if let Some(url) = &model.base_url {
        if !is_http_url(url) {
            report.error("model.baseUrl", format!("'{url}' is not an http(s) URL"));
        }
    }
}

fn validate_agent(config: &SightlineConfig, report: &mut ValidationReport) {
    let agent = &config.agent;
    if let Some(rounds) = agent.max_tool_rounds {
        if !(1..=MAX_TOOL_ROUNDS_LIMIT).contains(&rounds) {
            report.error(
                "agent.maxToolRounds",
                format!("maxToolRounds must be within 1..={MAX_TOOL_ROUNDS_LIMIT}, got {rounds}"),
            );
        }
    }
    if agent.tool_timeout_secs == Some(0) {
        report.error("agent.toolTimeoutSecs", "toolTimeoutSecs must be > 0");
    }
}

fn validate_perception(config: &SightlineConfig, report: &mut ValidationReport) {
    let perception = &config.perception;
    let caps = [("perception.detector", &perception.detector), ("perception.ocr", &perception.ocr)];

    let mut configured = 0;
    for (path, cap) in caps {
        let Some(cap) = cap else { continue };
        validate_capability(path, cap, report);
        if cap.endpoint().is_some() {
            configured += 1;
        }
    }
    if configured == 0 {
        report.warn("perception", "No perception endpoints configured; the agent cannot inspect images");
    }
}

fn validate_capability(path: &str, cap: &CapabilityConfig, report: &mut ValidationReport) {
    if let Some(endpoint) = cap.endpoint() {
        if !is_http_url(endpoint) {
            report.error(format!("{path}.endpoint"), format!("'{endpoint}' is not an http(s) URL"));
        }
        if cap.coordinate_space.is_none() {
            report.warn(
                format!("{path}.coordinateSpace"),
                "No coordinate space declared; undeclared boxes fall back to a best-effort guess",
            );
        }
    }
    if cap.timeout_secs == Some(0) {
        report.error(format!("{path}.timeoutSecs"), "timeoutSecs must be > 0");
    }
}

fn validate_logging(config: &SightlineConfig, report: &mut ValidationReport) {
    let level = config.logging.level();
    // Full EnvFilter directives (e.g. "sightline_agent=debug") are allowed.
    if !level.contains('=') && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.warn("logging.level", format!("Unrecognized log level '{level}'"));
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;

    #[test]
    fn default_config_is_valid() {
        let report = validate(&apply_all_defaults(SightlineConfig::default()));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.iter().any(|w| w.path == "perception"));
    }

    #[test]
    fn tool_rounds_out_of_range() {
        for rounds in [0, 51] {
            let mut cfg = SightlineConfig::default();
            cfg.agent.max_tool_rounds = Some(rounds);
            let report = validate(&cfg);
            assert!(!report.is_valid());
            assert_eq!(report.errors[0].path, "agent.maxToolRounds");
        }
    }

    #[test]
    fn unknown_provider_is_error() {
        let mut cfg = SightlineConfig::default();
        cfg.model.provider = Some("carrier-pigeon".into());
        assert!(!validate(&cfg).is_valid());
    }

    #[test]
    fn non_http_endpoint_is_error() {
        let mut cfg = SightlineConfig::default();
        cfg.perception.detector = Some(CapabilityConfig {
            endpoint: Some("localhost:9000".into()),
            ..Default::default()
        });
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "perception.detector.endpoint"));
    }
}
