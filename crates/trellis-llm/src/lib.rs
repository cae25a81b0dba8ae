//! Model invocation boundary for Trellis workflows.
//!
//! The engine describes an agent step as an [`AgentInvocation`] and hands it
//! to whichever [`LlmAdapter`] was plugged in. [`MockLlm`] is the
//! deterministic default; [`OpenAiAdapter`] talks to the Responses API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod errors;
pub mod mock;
pub mod openai;

pub use errors::LlmError;
pub use mock::MockLlm;
pub use openai::OpenAiAdapter;

/// Per-node tool switches carried through from the graph editor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub web_search: bool,
}

/// A normalized request for one agent step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentInvocation {
    pub system_prompt: String,
    pub user_content: String,
    pub model: String,
    pub reasoning_effort: Option<String>,
    pub tools: Option<ToolsConfig>,
}

/// The single capability the engine needs from a model provider.
///
/// Implementations must be substitutable: the engine behaves identically
/// whether the response text came from a live model or from [`MockLlm`].
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn respond(&self, invocation: &AgentInvocation) -> Result<String, LlmError>;
}
