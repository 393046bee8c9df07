//! `sightline config show | init | validate`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use sightline_config::{
    apply_all_defaults, load_and_prepare, load_raw, redact, resolve_env_vars_with, validate, write_config,
    CapabilityConfig, SightlineConfig, ValidationReport,
};
use sightline_core::CoordinateSpace;

use crate::terminal_output::{note_error, note_info, note_success, note_warn};

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective config with secrets masked
    Show,
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Check the config and list every problem found
    Validate,
}

pub async fn run(action: ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => show(path).await,
        ConfigAction::Init { force } => init(path, force).await,
        ConfigAction::Validate => {
            let env: HashMap<String, String> = std::env::vars().collect();
            let report = check(path, &env).await?;
            print_report(&report);
            if !report.is_valid() {
                bail!("{} error(s) in {}", report.errors.len(), path.display());
            }
            Ok(())
        }
    }
}

async fn show(path: &Path) -> Result<()> {
    let config = load_and_prepare(path).await?;
    let value = serde_json::to_value(&config).context("Failed to serialize config")?;
    let yaml = serde_yaml::to_string(&redact(&value)).context("Failed to render config")?;
    note_info(&format!("Effective config from {}", path.display()));
    print!("{yaml}");
    Ok(())
}

/// Starter file: mock model plus local perception endpoints, defaults filled in.
pub fn starter_config() -> SightlineConfig {
    let mut config = SightlineConfig::default();
    config.model.provider = Some("mock".to_string());
    config.perception.detector = Some(CapabilityConfig {
        name: Some("detector".to_string()),
        endpoint: Some("${SIGHTLINE_DETECTOR_URL:-http://localhost:9000/detect}".to_string()),
        coordinate_space: Some(CoordinateSpace::PixelAbsolute),
        timeout_secs: None,
    });
    config.perception.ocr = Some(CapabilityConfig {
        name: Some("ocr".to_string()),
        endpoint: Some("${SIGHTLINE_OCR_URL:-http://localhost:9100/ocr}".to_string()),
        coordinate_space: Some(CoordinateSpace::PixelAbsolute),
        timeout_secs: None,
    });
    apply_all_defaults(config)
}

async fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(&starter_config(), path).await?;
    note_success(&format!("Wrote {}", path.display()));
    Ok(())
}

/// Full validation pass that collects every problem instead of stopping at
/// the first one.
pub async fn check(path: &Path, env: &HashMap<String, String>) -> Result<ValidationReport> {
    let raw = load_raw(path).await?;
    let value = resolve_env_vars_with(&raw, env)?;
    let config: SightlineConfig = serde_json::from_value(value).context("Config structure is invalid")?;
    Ok(validate(&apply_all_defaults(config)))
}

pub fn print_report(report: &ValidationReport) {
    for warning in &report.warnings {
        note_warn(&format!("{}: {}", warning.path, warning.message));
    }
    for error in &report.errors {
        note_error(&format!("{}: {}", error.path, error.message));
    }
    if report.is_valid() {
        note_success("Config is valid");
    }
}
