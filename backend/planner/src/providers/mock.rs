use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sightline_core::{ImageId, LanguageModel, ModelContent, ModelReply, ToolRequest, ToolResultMessage};

/// One call the scripted model received.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedCall {
    Turn { text: String, image: Option<ImageId> },
    ToolResults(Vec<ToolResultMessage>),
}

/// A language model that replays canned replies and records every call.
///
/// When the script runs out it either answers with the fallback text or,
/// in autopilot mode, requests each listed tool once per user turn and then
/// reports the tool statuses back as its answer.
pub struct ScriptedModel {
    name: String,
    script: Mutex<VecDeque<Result<ModelReply, String>>>,
    calls: Mutex<Vec<ScriptedCall>>,
    delay: Option<Duration>,
    fallback: Option<String>,
    autopilot: Vec<String>,
}

impl ScriptedModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
            fallback: None,
            autopilot: Vec::new(),
        }
    }

    pub fn with_reply(self, reply: ModelReply) -> Self {
        self.push_reply(reply);
        self
    }

    /// Queue a transport failure.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        lock(&self.script).push_back(Err(message.into()));
        self
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Request these tools on every user turn once the script is exhausted.
    pub fn with_autopilot(mut self, tools: Vec<String>) -> Self {
        self.autopilot = tools;
        self
    }

    pub fn push_reply(&self, reply: ModelReply) {
        lock(&self.script).push_back(Ok(reply));
    }

    pub fn calls(&self) -> Vec<ScriptedCall> {
        lock(&self.calls).clone()
    }

    /// Calls of the `ToolResults` kind, in order.
    pub fn tool_result_batches(&self) -> Vec<Vec<ToolResultMessage>> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                ScriptedCall::ToolResults(results) => Some(results.clone()),
                ScriptedCall::Turn { .. } => None,
            })
            .collect()
    }

    async fn next(&self, call: ScriptedCall) -> Result<ModelReply> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = lock(&self.script).pop_front();
        let unscripted = match scripted {
            Some(Ok(reply)) => Some(reply),
            Some(Err(message)) => {
                lock(&self.calls).push(call);
                bail!(message);
            }
            None => None,
        };
        let reply = match unscripted {
            Some(reply) => reply,
            None => self.unscripted(&call)?,
        };
        lock(&self.calls).push(call);
        Ok(reply)
    }

    fn unscripted(&self, call: &ScriptedCall) -> Result<ModelReply> {
        match call {
            ScriptedCall::Turn { .. } if !self.autopilot.is_empty() => Ok(ModelReply::tools(
                self.autopilot
                    .iter()
                    .enumerate()
                    .map(|(i, tool)| ToolRequest::new(format!("auto_{i}"), tool.clone()))
                    .collect(),
            )),
            ScriptedCall::ToolResults(results) if !self.autopilot.is_empty() => {
                Ok(ModelReply::text(describe_results(results)))
            }
            _ => match &self.fallback {
                Some(text) => Ok(ModelReply::text(text.clone())),
                None => bail!("{}: script exhausted", self.name),
            },
        }
    }
}

fn describe_results(results: &[ToolResultMessage]) -> String {
    results
        .iter()
        .map(|r| {
            let tool = r.payload["tool"].as_str().unwrap_or("tool");
            match r.payload["status"].as_str() {
                Some("success") => {
                    let summary = &r.payload["summary"];
                    let mut line = format!("{tool}: {} item(s)", summary["count"]);
                    if let Some(text) = summary["full_text"].as_str().filter(|t| !t.is_empty()) {
                        line.push_str(&format!(", text: {}", text.replace('\n', " / ")));
                    }
                    line
                }
                _ => format!("{tool}: {}", r.payload["error"]["message"].as_str().unwrap_or("failed")),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_turn(&self, content: ModelContent) -> Result<ModelReply> {
        let call = ScriptedCall::Turn {
            text: content.text,
            image: content.image.map(|img| img.id),
        };
        self.next(call).await
    }

    async fn send_tool_results(&self, results: Vec<ToolResultMessage>) -> Result<ModelReply> {
        self.next(ScriptedCall::ToolResults(results)).await
    }
}
