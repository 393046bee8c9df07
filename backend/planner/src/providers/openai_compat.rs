//! OpenAI-compatible chat-completions transport with tool calling.
//!
//! Works against OpenAI, OpenRouter, and Ollama's `/v1` endpoint. The model
//! owns the running message history; the orchestrator only sees turns and
//! tool results.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use sightline_core::{LanguageModel, ModelContent, ModelReply, ToolRequest, ToolResultMessage, ToolSpec};

use crate::retry::{AttemptError, RetryPolicy};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

pub struct OpenAiCompatModel {
    provider: String,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    tools: Vec<Value>,
    retry: RetryPolicy,
    history: Mutex<Vec<ChatMessage>>,
}

impl OpenAiCompatModel {
    pub fn new(provider: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            temperature: 0.2,
            max_tokens: 1024,
            tools: Vec::new(),
            retry: RetryPolicy::default(),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(self)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_tools(mut self, tools: &[ToolSpec]) -> Self {
        self.tools = tools.iter().map(ToolSpec::to_function_schema).collect();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        if !prompt.is_empty() {
            self.history.get_mut().push(ChatMessage::text("system", prompt));
        }
        self
    }

    /// Send the current history and append the assistant's reply to it.
    async fn complete(&self, history: &mut Vec<ChatMessage>) -> Result<ModelReply> {
        let start = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages: history.as_slice(),
            tools: (!self.tools.is_empty()).then_some(self.tools.as_slice()),
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };

        debug!(
            provider = %self.provider,
            model = %self.model,
            messages = history.len(),
            "Sending chat completion"
        );

        let url = format!("{}/chat/completions", self.base_url);
        let (url, body, client, api_key) = (&url, &body, &self.client, self.api_key.as_deref());
        let response: ChatResponse = self
            .retry
            .run(&self.provider, move || async move {
                let mut request = client.post(url).json(body);
                if let Some(key) = api_key {
                    request = request.bearer_auth(key);
                }
                let response = request.send().await.map_err(AttemptError::from_reqwest)?;
                let status = response.status();
                if !status.is_success() {
                    let error_body = response.text().await.unwrap_or_default();
                    return Err(AttemptError::from_status(status, &error_body));
                }
                response
                    .json::<ChatResponse>()
                    .await
                    .context("Failed to parse chat completion response")
                    .map_err(AttemptError::Fatal)
            })
            .await
            .with_context(|| format!("{} chat completion failed", self.provider))?;

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .context("Chat completion returned no choices")?;

        let (assistant, reply) = accept_reply(message);
        debug!(
            provider = %self.provider,
            tool_calls = reply.tool_requests.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Chat completion received"
        );

        history.push(assistant);
        Ok(reply)
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.provider
    }

    async fn send_turn(&self, content: ModelContent) -> Result<ModelReply> {
        let mut history = self.history.lock().await;
        settle(&mut history);

        let message = match &content.image {
            Some(image) => ChatMessage {
                role: "user".into(),
                content: Some(MessageContent::Parts(vec![
                    ContentPart::Text { text: content.text.clone() },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image.data_url() },
                    },
                ])),
                tool_calls: Vec::new(),
                tool_call_id: None,
            },
            None => ChatMessage::text("user", content.text.clone()),
        };
        history.push(message);
        self.complete(&mut history).await
    }

    async fn send_tool_results(&self, results: Vec<ToolResultMessage>) -> Result<ModelReply> {
        let mut history = self.history.lock().await;
        for result in results {
            history.push(ChatMessage {
                role: "tool".into(),
                content: Some(MessageContent::Text(result.payload.to_string())),
                tool_calls: Vec::new(),
                tool_call_id: Some(result.id),
            });
        }
        self.complete(&mut history).await
    }
}

/// Drop a trailing exchange that never reached a final answer (failed,
/// cancelled, or cut off), so the next request has a well-formed history.
fn settle(history: &mut Vec<ChatMessage>) {
    let complete = history
        .last()
        .map(|m| m.role != "user" && m.role != "tool" && m.tool_calls.is_empty())
        .unwrap_or(true);
    if complete {
        return;
    }
    if let Some(pos) = history.iter().rposition(|m| m.role == "user") {
        warn!(dropped = history.len() - pos, "Discarding unfinished exchange from model history");
        history.truncate(pos);
    }
}

/// Split a response into the assistant message kept in history and the reply
/// handed to the orchestrator. Missing call ids are filled in once so both
/// sides carry the same ids.
fn accept_reply(message: ResponseMessage) -> (ChatMessage, ModelReply) {
    let mut tool_calls = message.tool_calls.unwrap_or_default();
    for (i, call) in tool_calls.iter_mut().enumerate() {
        if call.id.trim().is_empty() {
            call.id = format!("call_{i}");
        }
    }

    let tool_requests = tool_calls
        .iter()
        .map(|call| ToolRequest {
            id: call.id.clone(),
            name: call.function.name.clone(),
            arguments: parse_arguments(&call.function.arguments),
        })
        .collect();
    let reply = ModelReply {
        text: message.content.clone().filter(|t| !t.trim().is_empty()),
        tool_requests,
    };
    let assistant = ChatMessage {
        role: "assistant".into(),
        content: message.content.map(MessageContent::Text),
        tool_calls,
        tool_call_id: None,
    };
    (assistant, reply)
}

/// Loosely turn a JSON argument string into a string map.
///
/// Strings are kept as-is, other values are stringified, nulls are dropped.
/// Anything unparsable yields an empty map.
pub fn parse_arguments(raw: &str) -> BTreeMap<String, String> {
    if raw.trim().is_empty() {
        return BTreeMap::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::Null => None,
                Value::String(s) => Some((k, s)),
                other => Some((k, other.to_string())),
            })
            .collect(),
        Ok(_) | Err(_) => {
            warn!(raw = %raw, "Ignoring malformed tool arguments");
            BTreeMap::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(MessageContent::Text(content)),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}
