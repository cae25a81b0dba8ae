use crate::errors::EngineError;
use crate::graph::WorkflowNode;
use crate::log::ExecutionLog;
use crate::state::RunState;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub mod agent;
pub mod approval;
pub mod conditional;
pub mod end;
pub mod start;

/// What the walk loop should do after a node executes.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// Store the output under `last_output` and the node's id, then follow
    /// the first outgoing connection regardless of handle.
    Advance(Value),
    /// Follow the outgoing connection leaving through the named handle;
    /// no output is stored.
    Branch { handle: &'static str },
    /// Suspend the run until `resume()` is called.
    Pause,
    /// Terminate the run as completed.
    Complete,
}

/// One execution strategy per node type. Handlers mutate run state and the
/// log directly; routing stays with the engine.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn execute(
        &self,
        node: &WorkflowNode,
        state: &mut RunState,
        log: &mut ExecutionLog,
    ) -> Result<StepOutcome, EngineError>;
}

pub type SharedNodeHandler = Arc<dyn NodeHandler>;
