use crate::errors::EngineError;
use crate::graph::{NodeConfig, WorkflowNode};
use crate::handlers::{NodeHandler, StepOutcome};
use crate::log::{ExecutionLog, LogKind};
use crate::state::{LAST_OUTPUT, RunState};
use async_trait::async_trait;
use serde_json::Value;

/// Case-insensitive substring test against the JSON form of `last_output`.
///
/// Conditionals route without producing output: they never write to
/// `last_output` or under their own id.
#[derive(Debug, Default)]
pub struct ConditionalHandler;

#[async_trait]
impl NodeHandler for ConditionalHandler {
    async fn execute(
        &self,
        node: &WorkflowNode,
        state: &mut RunState,
        log: &mut ExecutionLog,
    ) -> Result<StepOutcome, EngineError> {
        let condition = match &node.config {
            NodeConfig::If { condition } => condition.clone(),
            _ => String::new(),
        };

        let subject = match state.get(LAST_OUTPUT) {
            Some(Value::Null) | None => Value::String(String::new()),
            Some(value) => value.clone(),
        };
        let matched = serde_json::to_string(&subject)
            .unwrap_or_default()
            .to_lowercase()
            .contains(&condition.to_lowercase());

        log.append(
            &node.id,
            LogKind::LogicCheck,
            format!("Condition \"{condition}\" evaluated as {matched}"),
        );

        Ok(StepOutcome::Branch {
            handle: if matched { "true" } else { "false" },
        })
    }
}
