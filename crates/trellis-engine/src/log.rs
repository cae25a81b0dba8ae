use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Node id used for graph-level entries that belong to no single node.
pub const SYSTEM_NODE_ID: &str = "system";

/// What kind of thing a log entry records. The snake_case strings are the
/// wire vocabulary consumed by editors and audit tooling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    StepStart,
    WaitInput,
    InputReceived,
    LogicCheck,
    StartPrompt,
    LlmResponse,
    LlmError,
    Warn,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    #[serde(rename = "nodeId")]
    pub node_id: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub content: String,
}

/// Called once per appended entry, in append order. No delivery guarantee
/// beyond that; streaming and telemetry live behind this seam.
pub trait LogObserver: Send + Sync {
    fn on_entry(&self, entry: &LogEntry);
}

impl<F> LogObserver for F
where
    F: Fn(&LogEntry) + Send + Sync,
{
    fn on_entry(&self, entry: &LogEntry) {
        self(entry);
    }
}

pub type SharedLogObserver = Arc<dyn LogObserver>;
pub type TimestampSource = Arc<dyn Fn() -> String + Send + Sync>;

/// The ordered, append-only trace of one run. Entries are never reordered
/// or removed; a paused run always carries at least one `wait_input` entry,
/// which is how a resuming caller discovers where the run stopped.
#[derive(Clone)]
pub struct ExecutionLog {
    entries: Vec<LogEntry>,
    timestamps: TimestampSource,
    observer: Option<SharedLogObserver>,
}

impl ExecutionLog {
    pub fn new(timestamps: Option<TimestampSource>, observer: Option<SharedLogObserver>) -> Self {
        Self {
            entries: Vec::new(),
            timestamps: timestamps.unwrap_or_else(|| Arc::new(default_timestamp)),
            observer,
        }
    }

    pub fn append(&mut self, node_id: &str, kind: LogKind, content: impl Into<String>) {
        let entry = LogEntry {
            timestamp: (self.timestamps)(),
            node_id: node_id.to_string(),
            kind,
            content: content.into(),
        };
        if let Some(observer) = self.observer.as_ref() {
            observer.on_entry(&entry);
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn contains(&self, node_id: &str, kind: LogKind) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.node_id == node_id && entry.kind == kind)
    }
}

impl Default for ExecutionLog {
    fn default() -> Self {
        Self::new(None, None)
    }
}

fn default_timestamp() -> String {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!(
        "{}.{:03}Z",
        since_epoch.as_secs(),
        since_epoch.subsec_millis()
    )
}
