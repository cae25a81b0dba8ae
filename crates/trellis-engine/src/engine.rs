use crate::graph::{NodeConfig, WorkflowGraph, WorkflowNode};
use crate::handlers::agent::AgentHandler;
use crate::handlers::approval::ApprovalHandler;
use crate::handlers::conditional::ConditionalHandler;
use crate::handlers::end::EndHandler;
use crate::handlers::start::StartHandler;
use crate::handlers::{SharedNodeHandler, StepOutcome};
use crate::log::{ExecutionLog, LogEntry, LogKind, SYSTEM_NODE_ID, SharedLogObserver, TimestampSource};
use crate::resume::ApprovalInput;
use crate::state::{LAST_OUTPUT, PRE_APPROVAL_OUTPUT, RunState};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use trellis_llm::{LlmAdapter, MockLlm};

/// Run lifecycle. Strictly forward except `Paused -> Running` via resume;
/// only `Running` branches into `Paused`/`Completed`/`Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// The only externally observable shape of a run. Callers read snapshots;
/// they never reach into the engine.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunResult {
    #[serde(rename = "runId")]
    pub run_id: String,
    pub status: RunStatus,
    pub logs: Vec<LogEntry>,
    pub state: RunState,
    #[serde(rename = "waitingForInput")]
    pub waiting_for_input: bool,
    #[serde(rename = "currentNodeId")]
    pub current_node_id: Option<String>,
}

#[derive(Default)]
pub struct EngineOptions {
    pub run_id: Option<String>,
    pub llm: Option<Arc<dyn LlmAdapter>>,
    pub timestamps: Option<TimestampSource>,
    pub log_observer: Option<SharedLogObserver>,
}

struct Executors {
    start: SharedNodeHandler,
    agent: SharedNodeHandler,
    conditional: SharedNodeHandler,
    approval: SharedNodeHandler,
    end: SharedNodeHandler,
}

/// Executes one run of one workflow graph.
///
/// The walk is an explicit loop over a current-node variable: strictly
/// sequential, one node at a time, with pause/completion/failure as the
/// named exits. The only await with external latency is the model call
/// inside the agent executor.
pub struct WorkflowEngine {
    run_id: String,
    graph: WorkflowGraph,
    state: RunState,
    log: ExecutionLog,
    status: RunStatus,
    current_node_id: Option<String>,
    waiting_for_input: bool,
    executors: Executors,
}

impl WorkflowEngine {
    pub fn new(graph: WorkflowGraph, options: EngineOptions) -> Self {
        let llm = options.llm.unwrap_or_else(|| Arc::new(MockLlm));
        Self {
            run_id: options.run_id.unwrap_or_else(default_run_id),
            graph,
            state: RunState::new(),
            log: ExecutionLog::new(options.timestamps, options.log_observer),
            status: RunStatus::Pending,
            current_node_id: None,
            waiting_for_input: false,
            executors: Executors {
                start: Arc::new(StartHandler),
                agent: Arc::new(AgentHandler::new(llm)),
                conditional: Arc::new(ConditionalHandler),
                approval: Arc::new(ApprovalHandler),
                end: Arc::new(EndHandler),
            },
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Pure snapshot of the run; the log doubles as the error channel.
    pub fn result(&self) -> RunResult {
        RunResult {
            run_id: self.run_id.clone(),
            status: self.status,
            logs: self.log.entries().to_vec(),
            state: self.state.clone(),
            waiting_for_input: self.waiting_for_input,
            current_node_id: self.current_node_id.clone(),
        }
    }

    /// Starts a fresh run. A graph without a start node fails immediately
    /// with a system-scoped error entry; no node is visited.
    pub async fn run(&mut self) -> RunResult {
        self.status = RunStatus::Running;
        let Some(start_id) = self.graph.start_node().map(|node| node.id.clone()) else {
            self.log.append(
                SYSTEM_NODE_ID,
                LogKind::Error,
                "No start node found in workflow graph",
            );
            self.status = RunStatus::Failed;
            return self.result();
        };
        self.walk(start_id).await;
        self.result()
    }

    /// Continues a paused run. Resuming a run in any other state is a
    /// silent no-op returning the current snapshot, so duplicate resume
    /// calls are harmless.
    pub async fn resume(&mut self, input: Value) -> RunResult {
        if self.status != RunStatus::Paused {
            return self.result();
        }
        let Some(current_id) = self.current_node_id.clone() else {
            return self.result();
        };
        let Some(node) = self.graph.node(&current_id).cloned() else {
            self.status = RunStatus::Failed;
            self.log
                .append(&current_id, LogKind::Error, "Unable to resume, current node missing");
            return self.result();
        };

        self.waiting_for_input = false;
        self.status = RunStatus::Running;

        let connection = if matches!(node.config, NodeConfig::Approval { .. }) {
            let decision = ApprovalInput::parse(&input);
            self.log
                .append(&node.id, LogKind::InputReceived, decision.describe());
            self.state.set(
                format!("{}_approval", node.id),
                json!({ "decision": decision.decision.as_str(), "note": decision.note }),
            );

            // Hand the pre-approval value to the next node; the decision
            // object must never flow through last_output.
            if let Some(snapshot) = self.state.remove(PRE_APPROVAL_OUTPUT) {
                let restored = match snapshot {
                    Value::String(text) => Value::String(text),
                    other => Value::String(other.to_string()),
                };
                self.state.set(LAST_OUTPUT, restored);
            }

            self.graph
                .outgoing_with_handle(&node.id, decision.decision.as_str())
                .cloned()
        } else {
            // Non-approval pauses take the raw input as the next output.
            self.log
                .append(&node.id, LogKind::InputReceived, input.to_string());
            let output = if input.is_null() {
                Value::String(String::new())
            } else {
                input
            };
            self.state.set(LAST_OUTPUT, output);
            self.graph.first_outgoing(&node.id).cloned()
        };

        match connection {
            Some(connection) => self.walk(connection.target).await,
            None => self.status = RunStatus::Completed,
        }
        self.result()
    }

    async fn walk(&mut self, entry_node_id: String) {
        let mut current_id = entry_node_id;
        loop {
            let Some(node) = self.graph.node(&current_id).cloned() else {
                // Connection pointed at a node that is not in the graph.
                self.status = RunStatus::Completed;
                return;
            };
            self.current_node_id = Some(node.id.clone());
            self.log
                .append(&node.id, LogKind::StepStart, describe_node(&node));

            let outcome = match self.execute_node(&node).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    self.log.append(&node.id, LogKind::Error, error.to_string());
                    self.status = RunStatus::Failed;
                    return;
                }
            };

            let next = match outcome {
                StepOutcome::Advance(output) => {
                    self.state.set(LAST_OUTPUT, output.clone());
                    self.state.set(node.id.clone(), output);
                    self.graph
                        .first_outgoing(&node.id)
                        .map(|connection| connection.target.clone())
                }
                StepOutcome::Branch { handle } => self
                    .graph
                    .outgoing_with_handle(&node.id, handle)
                    .map(|connection| connection.target.clone()),
                StepOutcome::Pause => {
                    self.status = RunStatus::Paused;
                    self.waiting_for_input = true;
                    return;
                }
                StepOutcome::Complete => {
                    self.status = RunStatus::Completed;
                    return;
                }
            };

            match next {
                Some(target) => current_id = target,
                None => {
                    self.status = RunStatus::Completed;
                    return;
                }
            }
        }
    }

    async fn execute_node(
        &mut self,
        node: &WorkflowNode,
    ) -> Result<StepOutcome, crate::errors::EngineError> {
        match &node.config {
            NodeConfig::Start { .. } => {
                self.executors
                    .start
                    .execute(node, &mut self.state, &mut self.log)
                    .await
            }
            NodeConfig::Agent(_) => {
                self.executors
                    .agent
                    .execute(node, &mut self.state, &mut self.log)
                    .await
            }
            NodeConfig::If { .. } => {
                self.executors
                    .conditional
                    .execute(node, &mut self.state, &mut self.log)
                    .await
            }
            NodeConfig::Approval { .. } => {
                self.executors
                    .approval
                    .execute(node, &mut self.state, &mut self.log)
                    .await
            }
            NodeConfig::End => {
                self.executors
                    .end
                    .execute(node, &mut self.state, &mut self.log)
                    .await
            }
            NodeConfig::Other { kind } => {
                self.log.append(
                    &node.id,
                    LogKind::Warn,
                    format!("Unknown node type \"{kind}\" skipped"),
                );
                // Transparent passthrough: reuse whatever last_output holds.
                Ok(StepOutcome::Advance(
                    self.state.get(LAST_OUTPUT).cloned().unwrap_or(Value::Null),
                ))
            }
        }
    }
}

fn describe_node(node: &WorkflowNode) -> String {
    match &node.config {
        NodeConfig::Start { .. } => "start node".to_string(),
        NodeConfig::Agent(config) => {
            let name = config
                .agent_name
                .as_deref()
                .filter(|name| !name.is_empty())
                .unwrap_or("Agent");
            format!("{name} agent node")
        }
        NodeConfig::If { .. } => "if/else node".to_string(),
        NodeConfig::Approval { .. } => "approval node".to_string(),
        NodeConfig::End => "end node".to_string(),
        NodeConfig::Other { kind } => format!("{kind} node"),
    }
}

fn default_run_id() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;
    use crate::handlers::NodeHandler;
    use async_trait::async_trait;

    fn graph(value: Value) -> WorkflowGraph {
        serde_json::from_value(value).expect("graph payload should deserialize")
    }

    fn fixed_clock_options(run_id: &str) -> EngineOptions {
        EngineOptions {
            run_id: Some(run_id.to_string()),
            timestamps: Some(Arc::new(|| "1.000Z".to_string())),
            ..EngineOptions::default()
        }
    }

    fn approval_graph() -> WorkflowGraph {
        graph(json!({
            "nodes": [
                { "id": "start-1", "type": "start", "data": { "initialInput": "draft v1" } },
                { "id": "gate-1", "type": "approval", "data": { "message": "Ship it?" } },
                { "id": "ship", "type": "end" },
                { "id": "rework", "type": "end" },
            ],
            "connections": [
                { "source": "start-1", "target": "gate-1" },
                { "source": "gate-1", "target": "ship", "sourceHandle": "approve" },
                { "source": "gate-1", "target": "rework", "sourceHandle": "reject" },
            ],
        }))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn run_without_start_node_expected_failed_with_system_error() {
        let mut engine = WorkflowEngine::new(
            graph(json!({
                "nodes": [{ "id": "end-1", "type": "end" }],
                "connections": [],
            })),
            fixed_clock_options("run-1"),
        );

        let result = engine.run().await;
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.logs.len(), 1);
        assert_eq!(result.logs[0].node_id, SYSTEM_NODE_ID);
        assert_eq!(result.logs[0].kind, LogKind::Error);
        // No node was visited.
        assert!(result.current_node_id.is_none());
        assert!(result.state.is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn run_start_to_end_expected_completed_with_two_step_starts() {
        let mut engine = WorkflowEngine::new(
            graph(json!({
                "nodes": [
                    { "id": "start-1", "type": "start", "data": { "initialInput": "hi" } },
                    { "id": "end-1", "type": "end" },
                ],
                "connections": [{ "source": "start-1", "target": "end-1" }],
            })),
            fixed_clock_options("run-1"),
        );

        let result = engine.run().await;
        assert_eq!(result.status, RunStatus::Completed);
        let kinds: Vec<(&str, LogKind)> = result
            .logs
            .iter()
            .map(|entry| (entry.node_id.as_str(), entry.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![("start-1", LogKind::StepStart), ("end-1", LogKind::StepStart)]
        );
        assert!(!result.waiting_for_input);
        assert_eq!(result.state.get(LAST_OUTPUT), Some(&json!("hi")));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn run_conditional_match_expected_true_branch_taken() {
        let mut engine = WorkflowEngine::new(
            graph(json!({
                "nodes": [
                    { "id": "start-1", "type": "start", "data": { "initialInput": "hello world" } },
                    { "id": "if-1", "type": "if", "data": { "condition": "hello" } },
                    { "id": "t", "type": "end" },
                    { "id": "f", "type": "end" },
                ],
                "connections": [
                    { "source": "start-1", "target": "if-1" },
                    { "source": "if-1", "target": "t", "sourceHandle": "true" },
                    { "source": "if-1", "target": "f", "sourceHandle": "false" },
                ],
            })),
            fixed_clock_options("run-1"),
        );

        let result = engine.run().await;
        assert_eq!(result.status, RunStatus::Completed);
        let logic = result
            .logs
            .iter()
            .find(|entry| entry.kind == LogKind::LogicCheck)
            .expect("logic_check entry should exist");
        assert_eq!(logic.content, "Condition \"hello\" evaluated as true");
        assert!(result
            .logs
            .iter()
            .any(|entry| entry.node_id == "t" && entry.kind == LogKind::StepStart));
        assert!(!result.logs.iter().any(|entry| entry.node_id == "f"));
        // Conditionals route without writing state under their own id.
        assert!(result.state.get("if-1").is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn run_conditional_without_branch_connection_expected_implicit_completion() {
        let mut engine = WorkflowEngine::new(
            graph(json!({
                "nodes": [
                    { "id": "start-1", "type": "start", "data": { "initialInput": "nope" } },
                    { "id": "if-1", "type": "if", "data": { "condition": "hello" } },
                ],
                "connections": [{ "source": "start-1", "target": "if-1" }],
            })),
            fixed_clock_options("run-1"),
        );

        let result = engine.run().await;
        assert_eq!(result.status, RunStatus::Completed);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn run_approval_expected_paused_waiting_at_gate() {
        let mut engine = WorkflowEngine::new(approval_graph(), fixed_clock_options("run-1"));

        let result = engine.run().await;
        assert_eq!(result.status, RunStatus::Paused);
        assert!(result.waiting_for_input);
        assert_eq!(result.current_node_id.as_deref(), Some("gate-1"));
        assert!(result
            .logs
            .iter()
            .any(|entry| entry.node_id == "gate-1" && entry.kind == LogKind::WaitInput));
        assert_eq!(result.state.get(PRE_APPROVAL_OUTPUT), Some(&json!("draft v1")));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resume_approve_expected_approve_branch_and_restored_output() {
        let mut engine = WorkflowEngine::new(approval_graph(), fixed_clock_options("run-1"));
        engine.run().await;

        let result = engine
            .resume(json!({ "decision": "approve", "note": "go" }))
            .await;
        assert_eq!(result.status, RunStatus::Completed);
        assert!(result
            .logs
            .iter()
            .any(|entry| entry.node_id == "ship" && entry.kind == LogKind::StepStart));
        assert!(!result.logs.iter().any(|entry| entry.node_id == "rework"));
        // last_output is the pre-approval value, not the decision object.
        assert_eq!(result.state.get(LAST_OUTPUT), Some(&json!("draft v1")));
        assert!(result.state.get(PRE_APPROVAL_OUTPUT).is_none());
        assert_eq!(
            result.state.get("gate-1_approval"),
            Some(&json!({ "decision": "approve", "note": "go" }))
        );
        let received = result
            .logs
            .iter()
            .find(|entry| entry.kind == LogKind::InputReceived)
            .expect("input_received entry should exist");
        assert_eq!(received.content, "User approved this step. Feedback: go");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resume_reject_expected_reject_branch() {
        let mut engine = WorkflowEngine::new(approval_graph(), fixed_clock_options("run-1"));
        engine.run().await;

        let result = engine.resume(json!("reject: not ready")).await;
        assert_eq!(result.status, RunStatus::Completed);
        assert!(result
            .logs
            .iter()
            .any(|entry| entry.node_id == "rework" && entry.kind == LogKind::StepStart));
        assert!(!result
            .logs
            .iter()
            .any(|entry| entry.node_id == "ship" && entry.kind == LogKind::StepStart));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resume_non_paused_run_expected_silent_noop() {
        let mut engine = WorkflowEngine::new(approval_graph(), fixed_clock_options("run-1"));
        engine.run().await;
        engine.resume(json!({ "decision": "approve" })).await;

        let first = engine.resume(json!("again")).await;
        let second = engine.resume(json!("and again")).await;
        assert_eq!(first, second);
        assert_eq!(first.status, RunStatus::Completed);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn run_agent_chain_expected_deterministic_mock_responses() {
        let workflow = json!({
            "nodes": [
                { "id": "start-1", "type": "start", "data": { "initialInput": "review this" } },
                { "id": "agent-1", "type": "agent", "data": { "agentName": "Reviewer" } },
                { "id": "end-1", "type": "end" },
            ],
            "connections": [
                { "source": "start-1", "target": "agent-1" },
                { "source": "agent-1", "target": "end-1" },
            ],
        });

        let mut first_engine =
            WorkflowEngine::new(graph(workflow.clone()), fixed_clock_options("run-a"));
        let mut second_engine = WorkflowEngine::new(graph(workflow), fixed_clock_options("run-b"));
        let first = first_engine.run().await;
        let second = second_engine.run().await;

        let responses = |result: &RunResult| -> Vec<String> {
            result
                .logs
                .iter()
                .filter(|entry| entry.kind == LogKind::LlmResponse)
                .map(|entry| entry.content.clone())
                .collect()
        };
        assert_eq!(responses(&first), responses(&second));
        assert_eq!(
            responses(&first),
            vec!["Mock response for \"review this\" using gpt-5.".to_string()]
        );
        assert_eq!(first.status, RunStatus::Completed);
        // step_start carries the configured agent name.
        assert!(first
            .logs
            .iter()
            .any(|entry| entry.content == "Reviewer agent node"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn run_unknown_node_type_expected_warn_and_passthrough() {
        let mut engine = WorkflowEngine::new(
            graph(json!({
                "nodes": [
                    { "id": "start-1", "type": "start", "data": { "initialInput": "kept" } },
                    { "id": "mystery", "type": "webhook" },
                    { "id": "end-1", "type": "end" },
                ],
                "connections": [
                    { "source": "start-1", "target": "mystery" },
                    { "source": "mystery", "target": "end-1" },
                ],
            })),
            fixed_clock_options("run-1"),
        );

        let result = engine.run().await;
        assert_eq!(result.status, RunStatus::Completed);
        let warn = result
            .logs
            .iter()
            .find(|entry| entry.kind == LogKind::Warn)
            .expect("warn entry should exist");
        assert_eq!(warn.content, "Unknown node type \"webhook\" skipped");
        assert_eq!(result.state.get(LAST_OUTPUT), Some(&json!("kept")));
        assert_eq!(result.state.get("mystery"), Some(&json!("kept")));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn run_dangling_connection_target_expected_completed() {
        let mut engine = WorkflowEngine::new(
            graph(json!({
                "nodes": [{ "id": "start-1", "type": "start" }],
                "connections": [{ "source": "start-1", "target": "ghost" }],
            })),
            fixed_clock_options("run-1"),
        );

        let result = engine.run().await;
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.logs.len(), 1);
    }

    struct ExplodingHandler;

    #[async_trait]
    impl NodeHandler for ExplodingHandler {
        async fn execute(
            &self,
            _node: &WorkflowNode,
            _state: &mut RunState,
            _log: &mut ExecutionLog,
        ) -> Result<StepOutcome, EngineError> {
            Err(EngineError::NodeExecution("agent executor exploded".to_string()))
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn run_executor_failure_expected_node_scoped_error_and_failed_status() {
        let mut engine = WorkflowEngine::new(
            graph(json!({
                "nodes": [
                    { "id": "start-1", "type": "start" },
                    { "id": "agent-1", "type": "agent" },
                    { "id": "end-1", "type": "end" },
                ],
                "connections": [
                    { "source": "start-1", "target": "agent-1" },
                    { "source": "agent-1", "target": "end-1" },
                ],
            })),
            fixed_clock_options("run-1"),
        );
        engine.executors.agent = Arc::new(ExplodingHandler);

        let result = engine.run().await;
        assert_eq!(result.status, RunStatus::Failed);
        let error = result
            .logs
            .iter()
            .find(|entry| entry.kind == LogKind::Error)
            .expect("error entry should exist");
        assert_eq!(error.node_id, "agent-1");
        assert_eq!(error.content, "agent executor exploded");
        // The walk halted; the end node was never visited.
        assert!(!result.logs.iter().any(|entry| entry.node_id == "end-1"));
        // State written by earlier nodes is intact.
        assert_eq!(result.state.get("start-1"), Some(&json!("")));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn result_serialization_expected_wire_field_names() {
        let engine = WorkflowEngine::new(approval_graph(), fixed_clock_options("run-1"));
        let value = serde_json::to_value(engine.result()).expect("result should serialize");
        assert_eq!(value["runId"], "run-1");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["waitingForInput"], false);
        assert_eq!(value["currentNodeId"], Value::Null);
    }
}
