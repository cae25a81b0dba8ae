use crate::errors::EngineError;
use crate::graph::{AgentConfig, NodeConfig, WorkflowNode};
use crate::handlers::{NodeHandler, StepOutcome};
use crate::log::{ExecutionLog, LogKind};
use crate::state::{LAST_OUTPUT, RunState};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use trellis_llm::{AgentInvocation, LlmAdapter};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const DEFAULT_MODEL: &str = "gpt-5";
const DEFAULT_REASONING_EFFORT: &str = "low";

/// Invokes the model adapter for an agent step.
///
/// An adapter failure is not fatal to the run: it is logged as `llm_error`
/// and a synthetic error string becomes the node output.
pub struct AgentHandler {
    llm: Arc<dyn LlmAdapter>,
}

impl AgentHandler {
    pub fn new(llm: Arc<dyn LlmAdapter>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl NodeHandler for AgentHandler {
    async fn execute(
        &self,
        node: &WorkflowNode,
        state: &mut RunState,
        log: &mut ExecutionLog,
    ) -> Result<StepOutcome, EngineError> {
        let NodeConfig::Agent(config) = &node.config else {
            return Err(EngineError::NodeExecution(format!(
                "node '{}' routed to the agent executor without agent configuration",
                node.id
            )));
        };

        let invocation = build_invocation(config, state);
        log.append(&node.id, LogKind::StartPrompt, invocation.user_content.clone());

        match self.llm.respond(&invocation).await {
            Ok(text) => {
                log.append(&node.id, LogKind::LlmResponse, text.clone());
                Ok(StepOutcome::Advance(Value::String(text)))
            }
            Err(error) => {
                let message = error.to_string();
                log.append(&node.id, LogKind::LlmError, message.clone());
                Ok(StepOutcome::Advance(Value::String(format!(
                    "LLM error: {message}"
                ))))
            }
        }
    }
}

fn build_invocation(config: &AgentConfig, state: &RunState) -> AgentInvocation {
    AgentInvocation {
        system_prompt: non_empty(config.system_prompt.as_deref())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
            .to_string(),
        user_content: resolve_user_content(config, state),
        model: non_empty(config.model.as_deref())
            .unwrap_or(DEFAULT_MODEL)
            .to_string(),
        reasoning_effort: Some(
            non_empty(config.reasoning_effort.as_deref())
                .unwrap_or(DEFAULT_REASONING_EFFORT)
                .to_string(),
        ),
        tools: config.tools,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

/// Resolution order: configured override, then `last_output` as a string,
/// then `last_output` JSON-stringified, then empty. If `last_output` is an
/// approval decision object that leaked through, it is discarded and the
/// newest non-approval string in state is used instead, so approval
/// metadata never reaches the model.
fn resolve_user_content(config: &AgentConfig, state: &RunState) -> String {
    if let Some(prompt) = config.user_prompt.as_deref() {
        if !prompt.trim().is_empty() {
            return prompt.to_string();
        }
    }

    let previous = state.get(LAST_OUTPUT);
    if let Some(Value::Object(map)) = previous {
        if map.contains_key("decision") || map.contains_key("note") {
            return state.last_string_ignoring_approvals().unwrap_or_default();
        }
    }

    match previous {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
