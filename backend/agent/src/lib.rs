//! Sightline Agent
//!
//! The conversation loop that turns a user question about an image into
//! perception tool calls and a grounded answer, plus the state it keeps:
//! turns, aggregated detections, and the tool invocation ledger.

pub mod agent_loop;
pub mod conversation;
pub mod detection_set;
pub mod ledger;
pub mod summary;
pub mod system_prompt;
pub mod tool_args;
pub mod tool_dispatcher;

pub use agent_loop::{DEFAULT_MAX_TOOL_ROUNDS, FinalAnswer, LoopState, Orchestrator, OrchestratorConfig};
pub use conversation::Conversation;
pub use detection_set::DetectionAggregator;
pub use ledger::{InvocationOutcome, InvocationStatus, ToolInvocation, ToolLedger};
pub use system_prompt::PromptBuilder;
pub use tool_args::{DETECT_OBJECTS, RECOGNIZE_TEXT, ToolCall};
pub use tool_dispatcher::{ToolDispatcher, ToolOutput, ToolResult, registered_tools};
