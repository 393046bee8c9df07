//! `sightline-config`: Sightline runtime configuration management.
//!
//! Provides:
//! - Typed config schema (model transport, loop limits, perception backends, logging)
//! - YAML read/write
//! - `${ENV_VAR}` / `${ENV_VAR:-fallback}` substitution
//! - Config redaction for safe display
//! - Default value application
//! - Schema validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

// Re-export most-used types at crate root.
pub use defaults::apply_all_defaults;
pub use env::{
    collect_referenced_vars, contains_env_var_reference, resolve_env_vars, resolve_env_vars_with,
    MissingEnvVarError,
};
pub use io::{config_dir, config_file_path, load_config, load_raw, write_config};
pub use redact::redact;
pub use schema::{AgentConfig, CapabilityConfig, LoggingConfig, ModelConfig, PerceptionConfig, SightlineConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport, KNOWN_PROVIDERS};

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Load, apply env substitution, apply defaults, and validate a config file.
///
/// This is the main entry point for loading a config at runtime. Validation
/// errors abort the load; warnings are logged.
pub async fn load_and_prepare(path: &Path) -> Result<SightlineConfig> {
    let env: HashMap<String, String> = std::env::vars().collect();
    load_and_prepare_with(path, &env).await
}

/// [`load_and_prepare`] against an explicit environment.
pub async fn load_and_prepare_with(path: &Path, env: &HashMap<String, String>) -> Result<SightlineConfig> {
    let raw = load_raw(path).await?;

    let value = resolve_env_vars_with(&raw, env).context("Failed to resolve env vars in config")?;

    let config: SightlineConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.into_iter().next() {
        bail!(first);
    }

    Ok(config)
}
