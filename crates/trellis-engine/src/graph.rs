use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use trellis_llm::ToolsConfig;

/// A directed edge between two nodes. `source_handle` names the output port
/// the edge leaves from (`true`/`false` on conditionals, `approve`/`reject`
/// on approvals); `target_handle` is cosmetic and never consulted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

/// Agent node configuration as drawn in the editor. Every field is optional;
/// defaults are applied where the invocation is built so a stored graph
/// round-trips without injected values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentConfig {
    pub agent_name: Option<String>,
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
    pub tools: Option<ToolsConfig>,
}

impl AgentConfig {
    fn decode(data: &Map<String, Value>) -> Self {
        Self {
            agent_name: data_str(data, "agentName"),
            system_prompt: data_str(data, "systemPrompt"),
            user_prompt: data_str(data, "userPrompt"),
            model: data_str(data, "model"),
            reasoning_effort: data_str(data, "reasoningEffort"),
            tools: data
                .get("tools")
                .and_then(|value| serde_json::from_value(value.clone()).ok()),
        }
    }
}

/// Per-type node configuration, decoded exactly once at graph load.
/// Unknown types are kept rather than rejected; they execute as a
/// passthrough with a warning.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeConfig {
    Start { initial_input: String },
    Agent(AgentConfig),
    If { condition: String },
    Approval { message: String },
    End,
    Other { kind: String },
}

impl NodeConfig {
    fn decode(kind: &str, data: &Map<String, Value>) -> Self {
        match kind {
            "start" => Self::Start {
                initial_input: data_str(data, "initialInput").unwrap_or_default(),
            },
            "agent" => Self::Agent(AgentConfig::decode(data)),
            "if" => Self::If {
                condition: data_str(data, "condition").unwrap_or_default(),
            },
            // Legacy graphs used "input" for human gates.
            "approval" | "input" => Self::Approval {
                message: data_str(data, "message").unwrap_or_default(),
            },
            "end" => Self::End,
            other => Self::Other {
                kind: other.to_string(),
            },
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Start { .. } => "start",
            Self::Agent(_) => "agent",
            Self::If { .. } => "if",
            Self::Approval { .. } => "approval",
            Self::End => "end",
            Self::Other { kind } => kind,
        }
    }
}

/// One typed step of a workflow. The raw `data` bag and any extra payload
/// fields (editor coordinates and the like) are preserved for persistence.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowNode {
    pub id: String,
    pub config: NodeConfig,
    pub data: Map<String, Value>,
    pub extra: Map<String, Value>,
}

/// A normalized workflow graph. Deserializing any loosely shaped payload
/// normalizes it: absent sequences become empty, legacy `input` nodes become
/// `approval`, per-type configuration is decoded. Normalization never fails;
/// malformed node data surfaces later as per-node warnings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawGraph", into = "RawGraph")]
pub struct WorkflowGraph {
    pub nodes: Vec<WorkflowNode>,
    pub connections: Vec<Connection>,
}

impl WorkflowGraph {
    pub fn normalize(raw: RawGraph) -> Self {
        raw.into()
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn start_node(&self) -> Option<&WorkflowNode> {
        self.nodes
            .iter()
            .find(|node| matches!(node.config, NodeConfig::Start { .. }))
    }

    /// First connection leaving `source`, regardless of handle.
    pub fn first_outgoing(&self, source: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|connection| connection.source == source)
    }

    /// First connection leaving `source` through the named handle.
    pub fn outgoing_with_handle(&self, source: &str, handle: &str) -> Option<&Connection> {
        self.connections.iter().find(|connection| {
            connection.source == source && connection.source_handle.as_deref() == Some(handle)
        })
    }
}

/// The wire shape of a submitted graph, tolerant of missing fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawGraph {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<RawGraph> for WorkflowGraph {
    fn from(raw: RawGraph) -> Self {
        Self {
            nodes: raw
                .nodes
                .into_iter()
                .map(|node| WorkflowNode {
                    config: NodeConfig::decode(&node.kind, &node.data),
                    id: node.id,
                    data: node.data,
                    extra: node.extra,
                })
                .collect(),
            connections: raw.connections,
        }
    }
}

impl From<WorkflowGraph> for RawGraph {
    fn from(graph: WorkflowGraph) -> Self {
        Self {
            nodes: graph
                .nodes
                .into_iter()
                .map(|node| RawNode {
                    id: node.id,
                    kind: node.config.kind().to_string(),
                    data: node.data,
                    extra: node.extra,
                })
                .collect(),
            connections: graph.connections,
        }
    }
}

fn data_str(data: &Map<String, Value>, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}
