use crate::errors::EngineError;
use crate::graph::WorkflowNode;
use crate::handlers::{NodeHandler, StepOutcome};
use crate::log::{ExecutionLog, LogKind};
use crate::state::{LAST_OUTPUT, PRE_APPROVAL_OUTPUT, RunState};
use async_trait::async_trait;

/// Suspends the run for a human decision.
///
/// `last_output` is snapshotted into `pre_approval_output` before pausing so
/// that resume can hand the pre-approval value to the next node instead of
/// the decision object.
#[derive(Debug, Default)]
pub struct ApprovalHandler;

#[async_trait]
impl NodeHandler for ApprovalHandler {
    async fn execute(
        &self,
        node: &WorkflowNode,
        state: &mut RunState,
        log: &mut ExecutionLog,
    ) -> Result<StepOutcome, EngineError> {
        if let Some(snapshot) = state.get(LAST_OUTPUT).cloned() {
            state.set(PRE_APPROVAL_OUTPUT, snapshot);
        }
        log.append(&node.id, LogKind::WaitInput, "Waiting for user approval");
        Ok(StepOutcome::Pause)
    }
}
