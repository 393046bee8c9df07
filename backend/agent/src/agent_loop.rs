//! Conversation orchestrator.
//!
//! Drives one user exchange: a model turn, then rounds of tool dispatch and
//! follow-up model turns until the model answers without requesting tools.
//!
//! `Idle -> AwaitingModelTurn -> (DispatchingTools <-> AwaitingModelTurn)* -> Idle`

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use sightline_core::{
    ActiveImage, LanguageModel, ModelContent, ModelReply, NormalizedDetection, OrchestratorError,
    ToolError, ToolRequest, ToolResultMessage, Turn,
};
use sightline_logging::{AgentEvent, EventLogger};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::conversation::Conversation;
use crate::ledger::{InvocationOutcome, ToolInvocation};
use crate::tool_dispatcher::{ToolDispatcher, ToolResult};

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 5;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Tool rounds allowed per exchange before giving up.
    pub max_tool_rounds: usize,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            model_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    AwaitingModelTurn,
    DispatchingTools,
}

/// The agent's answer to one user message.
#[derive(Debug, Clone, Serialize)]
pub struct FinalAnswer {
    pub text: String,
    /// Number of tool rounds it took.
    pub tool_rounds: usize,
    /// Number of tool invocations across all rounds.
    pub invocations: usize,
}

/// Marks the loop as in flight; back to `Idle` on drop.
struct LoopGuard<'a> {
    state: &'a Mutex<LoopState>,
}

impl<'a> LoopGuard<'a> {
    fn acquire(state: &'a Mutex<LoopState>) -> Result<Self, OrchestratorError> {
        let mut current = lock(state);
        if *current != LoopState::Idle {
            return Err(OrchestratorError::ConversationBusy);
        }
        *current = LoopState::AwaitingModelTurn;
        Ok(Self { state })
    }

    fn set(&self, next: LoopState) {
        *lock(self.state) = next;
    }
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        *lock(self.state) = LoopState::Idle;
    }
}

fn lock(state: &Mutex<LoopState>) -> MutexGuard<'_, LoopState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    dispatcher: Arc<ToolDispatcher>,
    config: OrchestratorConfig,
    conversation: RwLock<Conversation>,
    state: Mutex<LoopState>,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        dispatcher: Arc<ToolDispatcher>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            model,
            dispatcher,
            config,
            conversation: RwLock::new(Conversation::new()),
            state: Mutex::new(LoopState::Idle),
        }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub fn state(&self) -> LoopState {
        *lock(&self.state)
    }

    /// Aggregated detections for the active image.
    pub async fn detections(&self) -> Vec<NormalizedDetection> {
        self.conversation.read().await.detections().snapshot()
    }

    pub async fn ledger(&self) -> Vec<ToolInvocation> {
        self.conversation.read().await.ledger.entries().to_vec()
    }

    pub async fn turns(&self) -> Vec<Turn> {
        self.conversation.read().await.turns().to_vec()
    }

    pub async fn active_image(&self) -> Option<ActiveImage> {
        self.conversation.read().await.active_image().cloned()
    }

    /// Replace the active image between exchanges.
    pub async fn upload_image(&self, image: ActiveImage) -> Result<(), OrchestratorError> {
        let _guard = LoopGuard::acquire(&self.state)?;
        self.conversation.write().await.set_active_image(image);
        Ok(())
    }

    /// Run one user exchange to completion.
    ///
    /// An `image` whose id differs from the active one replaces it first.
    /// Fails fast with `ConversationBusy` if another exchange is in flight.
    #[instrument(skip_all, fields(chars = text.len(), with_image = image.is_some()))]
    pub async fn handle_user_message(
        &self,
        text: &str,
        image: Option<ActiveImage>,
        cancel: &CancellationToken,
    ) -> Result<FinalAnswer, OrchestratorError> {
        let guard = LoopGuard::acquire(&self.state)?;
        info!("Starting exchange");

        let result = self.run_exchange(&guard, text, image, cancel).await;
        match &result {
            Ok(answer) => info!(
                tool_rounds = answer.tool_rounds,
                invocations = answer.invocations,
                "Exchange finished"
            ),
            Err(err) => {
                error!(error = %err, "Exchange failed");
                let mut conv = self.conversation.write().await;
                EventLogger::log_event(
                    &conv.id,
                    AgentEvent::ExchangeFailed {
                        error_msg: err.to_string(),
                    },
                );
                conv.record_turn(Turn::system(err.to_string()));
            }
        }
        result
    }

    async fn run_exchange(
        &self,
        guard: &LoopGuard<'_>,
        text: &str,
        image: Option<ActiveImage>,
        cancel: &CancellationToken,
    ) -> Result<FinalAnswer, OrchestratorError> {
        let active = {
            let mut conv = self.conversation.write().await;
            if let Some(image) = image {
                conv.set_active_image(image);
            }
            conv.record_turn(Turn::user(text));
            conv.active_image().cloned()
        };

        let content = ModelContent {
            text: text.to_string(),
            image: active.clone(),
        };
        let mut reply = self.await_model(cancel, self.model.send_turn(content)).await?;

        let mut tool_rounds = 0;
        let mut invocations = 0;
        while !reply.is_final() {
            if tool_rounds >= self.config.max_tool_rounds {
                warn!(max_rounds = self.config.max_tool_rounds, "Tool loop limit reached");
                return Err(OrchestratorError::ToolLoopExceeded {
                    max_rounds: self.config.max_tool_rounds,
                });
            }
            tool_rounds += 1;
            invocations += reply.tool_requests.len();
            debug!(round = tool_rounds, requests = reply.tool_requests.len(), "Dispatching tools");

            guard.set(LoopState::DispatchingTools);
            let results = self.run_tool_round(&reply, active.as_ref(), cancel).await?;

            guard.set(LoopState::AwaitingModelTurn);
            reply = self
                .await_model(cancel, self.model.send_tool_results(results))
                .await?;
        }

        let text = reply.text.unwrap_or_default();
        self.conversation
            .write()
            .await
            .record_turn(Turn::agent(text.clone(), Vec::new()));

        Ok(FinalAnswer {
            text,
            tool_rounds,
            invocations,
        })
    }

    /// Dispatch every request of one model reply concurrently and collect all
    /// results before returning.
    async fn run_tool_round(
        &self,
        reply: &ModelReply,
        image: Option<&ActiveImage>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolResultMessage>, OrchestratorError> {
        let requests = &reply.tool_requests;
        let invocation_ids: Vec<Uuid> = {
            let mut conv = self.conversation.write().await;
            conv.record_turn(Turn::agent(
                reply.text.clone().unwrap_or_default(),
                requests.clone(),
            ));
            requests.iter().map(|r| conv.ledger.record(r)).collect()
        };

        let dispatches = requests.iter().map(|r| self.dispatch_with_timeout(r, image));
        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            results = join_all(dispatches) => Some(results),
        };

        let mut conv = self.conversation.write().await;
        let Some(results) = results else {
            warn!(pending = invocation_ids.len(), "Tool round cancelled");
            let reason = ToolError::Cancelled.to_string();
            for id in invocation_ids {
                conv.ledger.resolve(id, InvocationOutcome::Error(reason.clone()));
            }
            return Err(OrchestratorError::Cancelled);
        };

        let mut messages = Vec::with_capacity(results.len());
        for (id, result) in invocation_ids.into_iter().zip(results) {
            let payload = result.payload();
            match &result.outcome {
                Ok(output) => {
                    conv.ledger
                        .resolve(id, InvocationOutcome::Success(payload.to_string()));
                    if let Some(image) = image {
                        conv.absorb(image.id, output.detections.clone());
                    }
                }
                Err(err) => {
                    conv.ledger
                        .resolve(id, InvocationOutcome::Error(err.to_string()));
                }
            }
            messages.push(ToolResultMessage {
                id: result.request_id,
                payload,
            });
        }
        Ok(messages)
    }

    async fn dispatch_with_timeout(&self, request: &ToolRequest, image: Option<&ActiveImage>) -> ToolResult {
        match tokio::time::timeout(self.config.tool_timeout, self.dispatcher.dispatch(request, image)).await {
            Ok(result) => result,
            Err(_) => ToolResult::failed(
                request,
                ToolError::TimedOut {
                    tool: request.name.clone(),
                    secs: self.config.tool_timeout.as_secs(),
                },
            ),
        }
    }

    /// Wait for a model call, honoring cancellation and the model timeout.
    async fn await_model<F>(&self, cancel: &CancellationToken, call: F) -> Result<ModelReply, OrchestratorError>
    where
        F: Future<Output = anyhow::Result<ModelReply>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
            outcome = tokio::time::timeout(self.config.model_timeout, call) => match outcome {
                Ok(Ok(reply)) => Ok(reply),
                Ok(Err(e)) => Err(OrchestratorError::AgentCommunication(format!("{e:#}"))),
                Err(_) => Err(OrchestratorError::AgentCommunication(format!(
                    "{} did not respond within {}s",
                    self.model.name(),
                    self.config.model_timeout.as_secs()
                ))),
            },
        }
    }
}
