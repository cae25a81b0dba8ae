use crate::errors::EngineError;
use crate::graph::WorkflowNode;
use crate::handlers::{NodeHandler, StepOutcome};
use crate::log::ExecutionLog;
use crate::state::RunState;
use async_trait::async_trait;

/// Terminates the walk; produces no output.
#[derive(Debug, Default)]
pub struct EndHandler;

#[async_trait]
impl NodeHandler for EndHandler {
    async fn execute(
        &self,
        _node: &WorkflowNode,
        _state: &mut RunState,
        _log: &mut ExecutionLog,
    ) -> Result<StepOutcome, EngineError> {
        Ok(StepOutcome::Complete)
    }
}
