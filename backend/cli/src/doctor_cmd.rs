//! `sightline doctor`: config, credentials, and perception backends at a glance.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use sightline_config::load_and_prepare;
use sightline_understanding::{CapabilityRegistry, CapabilityState};

use crate::config_cmd::{check, print_report};
use crate::session::build_registry;
use crate::terminal_output::{note_error, note_info, note_success, note_warn};

pub async fn run(path: &Path) -> Result<()> {
    println!("\nRunning Sightline doctor...\n");

    println!("Config ({}):", path.display());
    if !path.exists() {
        note_warn("No config file; built-in defaults apply (run `sightline config init`)");
    }
    let env: HashMap<String, String> = std::env::vars().collect();
    let report = check(path, &env).await?;
    print_report(&report);
    if !report.is_valid() {
        println!();
        note_error("Fix the config errors above before continuing.");
        return Ok(());
    }
    let config = load_and_prepare(path).await?;

    println!("\nModel:");
    note_info(&format!(
        "{} / {} (timeout {}s, {} retries)",
        config.model.provider(),
        config.model.model_name(),
        config.model.request_timeout_secs(),
        config.model.max_retries()
    ));

    println!("\nPerception:");
    let registry = build_registry(&config.perception);
    let healthy = warm_up(&registry).await;

    println!();
    if healthy {
        note_success("All checks passed.");
    } else {
        note_error("Some checks failed. See above.");
    }
    Ok(())
}

/// Initialize every registered backend and report its state.
async fn warm_up(registry: &CapabilityRegistry) -> bool {
    if let Some(handle) = registry.detector() {
        let _ = handle.get().await;
    }
    if let Some(handle) = registry.recognizer() {
        let _ = handle.get().await;
    }

    let states = registry.states();
    if states.is_empty() {
        note_warn("No perception backends configured");
        return false;
    }
    let mut healthy = true;
    for (name, state) in states {
        match state {
            CapabilityState::Ready => note_success(&format!("{name} is ready")),
            CapabilityState::Failed(reason) => {
                healthy = false;
                note_error(&format!("{name} failed to initialize: {reason}"));
            }
            other => {
                healthy = false;
                note_warn(&format!("{name} is {other:?}"));
            }
        }
    }
    healthy
}
