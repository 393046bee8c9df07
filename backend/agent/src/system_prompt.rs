//! System prompt builder.

use sightline_understanding::CapabilityRegistry;

use crate::tool_dispatcher::registered_tools;

pub struct PromptBuilder;

impl PromptBuilder {
    /// Builds the system prompt for the registered perception tools.
    pub fn system_prompt(registry: &CapabilityRegistry) -> String {
        let tools = registered_tools(registry);
        let tool_lines = if tools.is_empty() {
            "No perception tools are available. Tell the user you cannot inspect the image.".to_string()
        } else {
            tools
                .iter()
                .map(|t| format!("- {}: {}", t.name, t.description))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "{}\n\nTOOLS:\n{}\n\nRULES:\n\
             1. Never describe image content you have not obtained from a tool.\n\
             2. All boxes returned by tools are absolute pixel coordinates [xmin, ymin, xmax, ymax] \
             of the current image. Quote them in that form.\n\
             3. If a tool returns status \"error\", explain the problem to the user instead of guessing.\n\
             4. When no image is attached, ask the user to upload one.",
            Self::build_identity(),
            tool_lines
        )
    }

    /// Use `custom` when configured, otherwise the generated prompt.
    pub fn build(custom: Option<&str>, registry: &CapabilityRegistry) -> String {
        match custom {
            Some(prompt) if !prompt.trim().is_empty() => prompt.to_string(),
            _ => Self::system_prompt(registry),
        }
    }

    fn build_identity() -> &'static str {
        "You are Sightline, an assistant that answers questions about an image the user uploaded. \
         You cannot see the image directly; you perceive it only through the tools below."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use sightline_core::{ActiveImage, CoordinateSpace, Detection, TextRecognizer};
    use sightline_understanding::CapabilityHandle;

    struct Ocr;

    #[async_trait]
    impl TextRecognizer for Ocr {
        fn name(&self) -> &str {
            "ocr"
        }
        fn coordinate_space(&self) -> Option<CoordinateSpace> {
            Some(CoordinateSpace::PixelAbsolute)
        }
        async fn recognize(&self, _image: &ActiveImage) -> Result<Vec<Detection>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_prompt_lists_only_registered_tools() {
        let registry = CapabilityRegistry::new()
            .with_recognizer(CapabilityHandle::ready("ocr", Arc::new(Ocr) as Arc<dyn TextRecognizer>));
        let prompt = PromptBuilder::system_prompt(&registry);
        assert!(prompt.contains("recognize_text"));
        assert!(!prompt.contains("detect_objects"));
        assert!(prompt.contains("absolute pixel coordinates"));
    }

    #[test]
    fn test_custom_prompt_wins() {
        let registry = CapabilityRegistry::new();
        assert_eq!(PromptBuilder::build(Some("be brief"), &registry), "be brief");
        assert!(PromptBuilder::build(Some("  "), &registry).contains("No perception tools"));
    }
}
