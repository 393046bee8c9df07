pub mod mock;
pub mod openai_compat;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::info;

use sightline_config::ModelConfig;
use sightline_core::{LanguageModel, ToolSpec};

use crate::retry::RetryPolicy;
use mock::ScriptedModel;
use openai_compat::{OpenAiCompatModel, OLLAMA_BASE_URL, OPENAI_BASE_URL, OPENROUTER_BASE_URL};

/// Transport retry policy for the configured model.
pub fn retry_policy(config: &ModelConfig) -> RetryPolicy {
    RetryPolicy::default().with_max_retries(config.max_retries())
}

/// Build the language model named by `config.provider`.
///
/// `tools` are advertised to the model; `system_prompt` seeds its history.
pub fn build_model(
    config: &ModelConfig,
    system_prompt: String,
    tools: &[ToolSpec],
) -> Result<Arc<dyn LanguageModel>> {
    let provider = config.provider();
    let default_url = match provider {
        "openai" => OPENAI_BASE_URL,
        "openrouter" => OPENROUTER_BASE_URL,
        "ollama" => OLLAMA_BASE_URL,
        "mock" => {
            info!("Using scripted mock model");
            let tool_names = tools.iter().map(|t| t.name.clone()).collect();
            return Ok(Arc::new(
                ScriptedModel::new("mock")
                    .with_autopilot(tool_names)
                    .with_fallback("(mock) No perception tools are configured."),
            ));
        }
        other => bail!("Unknown model provider '{other}'"),
    };

    let base_url = config.base_url.as_deref().unwrap_or(default_url);
    let retry = retry_policy(config);
    let model = OpenAiCompatModel::new(provider, base_url, config.model_name())
        .with_api_key(config.api_key.clone())
        .with_sampling(config.temperature(), config.max_tokens())
        .with_timeout(Duration::from_secs(config.request_timeout_secs()))?
        .with_retry(retry)
        .with_tools(tools)
        .with_system_prompt(system_prompt);

    info!(provider, base_url, model = config.model_name(), tools = tools.len(), "Language model ready");
    Ok(Arc::new(model))
}
