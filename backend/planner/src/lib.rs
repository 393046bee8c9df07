//! Language-model capabilities for Sightline: an OpenAI-compatible
//! tool-calling transport, a scripted mock, and the transport retry policy.

pub mod providers;
pub mod retry;

pub use providers::{build_model, retry_policy};
pub use providers::mock::{ScriptedCall, ScriptedModel};
pub use providers::openai_compat::OpenAiCompatModel;
pub use retry::RetryPolicy;
