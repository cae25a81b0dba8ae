use crate::errors::EngineError;
use crate::graph::{NodeConfig, WorkflowNode};
use crate::handlers::{NodeHandler, StepOutcome};
use crate::log::ExecutionLog;
use crate::state::RunState;
use async_trait::async_trait;
use serde_json::Value;

/// Seeds the run with the configured initial input (or an empty string).
#[derive(Debug, Default)]
pub struct StartHandler;

#[async_trait]
impl NodeHandler for StartHandler {
    async fn execute(
        &self,
        node: &WorkflowNode,
        _state: &mut RunState,
        _log: &mut ExecutionLog,
    ) -> Result<StepOutcome, EngineError> {
        let initial_input = match &node.config {
            NodeConfig::Start { initial_input } => initial_input.clone(),
            _ => String::new(),
        };
        Ok(StepOutcome::Advance(Value::String(initial_input)))
    }
}
