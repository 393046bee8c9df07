//! Builds a ready-to-use orchestrator from the loaded configuration.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::FutureExt;
use image::ImageReader;
use sightline_agent::{Orchestrator, OrchestratorConfig, PromptBuilder, ToolDispatcher};
use sightline_config::{CapabilityConfig, LoggingConfig, PerceptionConfig, SightlineConfig};
use sightline_core::{ActiveImage, ImageDimensions, ObjectDetector, TextRecognizer};
use sightline_logging::LogOptions;
use sightline_understanding::{CapabilityHandle, CapabilityRegistry, HttpObjectDetector, HttpTextRecognizer};
use tracing::{info, warn};

/// Register a lazily built HTTP backend for every perception section that
/// has an endpoint.
pub fn build_registry(perception: &PerceptionConfig) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();

    if let Some(cfg) = perception.detector.as_ref().filter(|c| c.endpoint().is_some()) {
        let cfg = cfg.clone();
        let name = handle_name(&cfg, "detector");
        registry = registry.with_detector(CapabilityHandle::lazy(name.clone(), move || {
            let cfg = cfg.clone();
            let name = name.clone();
            async move {
                let endpoint = cfg.endpoint().unwrap_or_default().to_string();
                let detector = HttpObjectDetector::new(endpoint)?
                    .with_name(name)
                    .with_coordinate_space(cfg.coordinate_space)
                    .with_timeout(Duration::from_secs(cfg.timeout_secs()))?;
                let detector: Arc<dyn ObjectDetector> = Arc::new(detector);
                anyhow::Ok(detector)
            }
            .boxed()
        }));
    }

    if let Some(cfg) = perception.ocr.as_ref().filter(|c| c.endpoint().is_some()) {
        let cfg = cfg.clone();
        let name = handle_name(&cfg, "ocr");
        registry = registry.with_recognizer(CapabilityHandle::lazy(name.clone(), move || {
            let cfg = cfg.clone();
            let name = name.clone();
            async move {
                let endpoint = cfg.endpoint().unwrap_or_default().to_string();
                let recognizer = HttpTextRecognizer::new(endpoint)?
                    .with_name(name)
                    .with_coordinate_space(cfg.coordinate_space)
                    .with_timeout(Duration::from_secs(cfg.timeout_secs()))?;
                let recognizer: Arc<dyn TextRecognizer> = Arc::new(recognizer);
                anyhow::Ok(recognizer)
            }
            .boxed()
        }));
    }

    registry
}

fn handle_name(cfg: &CapabilityConfig, fallback: &str) -> String {
    cfg.name.clone().unwrap_or_else(|| fallback.to_string())
}

/// Loop limits derived from config. The model deadline covers every
/// transport attempt of a single call plus the backoff between them.
pub fn orchestrator_config(config: &SightlineConfig) -> OrchestratorConfig {
    let attempts = u64::from(config.model.max_retries()) + 1;
    let per_attempt = Duration::from_secs(config.model.request_timeout_secs());
    let backoff = sightline_planner::retry_policy(&config.model).worst_case_backoff();
    OrchestratorConfig {
        max_tool_rounds: config.agent.max_tool_rounds(),
        model_timeout: per_attempt * attempts as u32 + backoff,
        tool_timeout: Duration::from_secs(config.agent.tool_timeout_secs()),
    }
}

pub fn build_orchestrator(config: &SightlineConfig) -> Result<Orchestrator> {
    let registry = build_registry(&config.perception);
    if registry.states().is_empty() {
        warn!("No perception backends configured; the agent cannot inspect images");
    }

    let dispatcher = ToolDispatcher::new(registry);
    let prompt = PromptBuilder::build(config.agent.system_prompt.as_deref(), dispatcher.registry());
    let model = sightline_planner::build_model(&config.model, prompt, &dispatcher.tool_specs())?;

    info!(
        model = model.name(),
        tools = ?dispatcher.tool_names(),
        max_tool_rounds = config.agent.max_tool_rounds(),
        "Session ready"
    );
    Ok(Orchestrator::new(model, Arc::new(dispatcher), orchestrator_config(config)))
}

/// Sniff format and dimensions from encoded image bytes.
pub fn image_from_bytes(bytes: Vec<u8>) -> Result<ActiveImage> {
    let reader = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .context("Failed to read image header")?;
    let Some(format) = reader.format() else {
        bail!("Unrecognized image format");
    };
    let (width, height) = reader
        .into_dimensions()
        .context("Failed to read image dimensions")?;
    if width == 0 || height == 0 {
        bail!("Image has zero area ({width}x{height})");
    }
    Ok(ActiveImage::new(bytes, format.to_mime_type(), ImageDimensions::new(width, height)))
}

pub async fn load_image(path: &Path) -> Result<ActiveImage> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    let image = image_from_bytes(bytes).with_context(|| format!("Not a usable image: {}", path.display()))?;
    info!(
        path = %path.display(),
        mime = %image.mime_type,
        dimensions = %image.dimensions,
        "Loaded image"
    );
    Ok(image)
}

/// `--log-level` beats the config file; `RUST_LOG` beats both.
pub fn log_options(logging: &LoggingConfig, level_override: Option<&str>) -> LogOptions {
    LogOptions {
        level: level_override.unwrap_or(logging.level()).to_string(),
        dir: logging.dir.as_deref().map(PathBuf::from),
        json: logging.json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use sightline_understanding::CapabilityState;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        RgbImage::new(width, height)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn reads_format_and_dimensions() {
        let image = image_from_bytes(png(64, 48)).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.dimensions, ImageDimensions::new(64, 48));
    }

    #[test]
    fn rejects_non_images() {
        assert!(image_from_bytes(b"definitely not an image".to_vec()).is_err());
    }

    #[test]
    fn registers_only_configured_backends() {
        let perception = PerceptionConfig {
            detector: Some(CapabilityConfig {
                endpoint: Some("http://localhost:9000/detect".into()),
                ..Default::default()
            }),
            ocr: Some(CapabilityConfig {
                endpoint: Some("   ".into()),
                ..Default::default()
            }),
        };
        let registry = build_registry(&perception);
        assert_eq!(
            registry.states(),
            vec![("detector".to_string(), CapabilityState::Uninitialized)]
        );
        assert!(registry.recognizer().is_none());
    }

    #[tokio::test]
    async fn lazy_backend_initializes_on_first_use() {
        let perception = PerceptionConfig {
            ocr: Some(CapabilityConfig {
                name: Some("paddle".into()),
                endpoint: Some("http://localhost:9100/ocr".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let registry = build_registry(&perception);
        let handle = registry.recognizer().unwrap();
        let ocr = handle.get().await.unwrap();
        assert_eq!(ocr.name(), "paddle");
        assert_eq!(handle.state(), CapabilityState::Ready);
    }

    #[test]
    fn model_deadline_covers_retries() {
        let mut config = SightlineConfig::default();
        config.model.request_timeout_secs = Some(10);
        config.model.max_retries = Some(2);
        config.agent.max_tool_rounds = Some(3);
        let oc = orchestrator_config(&config);
        // three 10s attempts plus up to 0.625s + 1.25s of jittered backoff
        assert_eq!(oc.model_timeout, Duration::from_millis(30_000 + 625 + 1_250));
        assert_eq!(oc.max_tool_rounds, 3);
    }

    #[test]
    fn default_deadline_outlasts_slowest_transport() {
        let config = SightlineConfig::default();
        let policy = sightline_planner::retry_policy(&config.model);
        let attempts = policy.max_retries + 1;
        let slowest = Duration::from_secs(config.model.request_timeout_secs()) * attempts
            + policy.worst_case_backoff();
        assert!(orchestrator_config(&config).model_timeout >= slowest);
    }

    #[test]
    fn log_level_override_wins() {
        let logging = LoggingConfig {
            level: Some("warn".into()),
            dir: Some("/tmp/sightline-logs".into()),
            json: Some(true),
        };
        let opts = log_options(&logging, Some("debug"));
        assert_eq!(opts.level, "debug");
        assert_eq!(opts.dir, Some(PathBuf::from("/tmp/sightline-logs")));
        assert!(opts.json);
    }
}
