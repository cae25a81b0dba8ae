use crate::engine::{RunStatus, WorkflowEngine};
use crate::errors::EngineError;
use crate::graph::WorkflowGraph;
use crate::log::LogEntry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Durable audit snapshot of a run, written as `run_<runId>.json`.
///
/// Write-only from the engine's point of view: records are for audit and
/// replay tooling, the engine never reads them back mid-run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(rename = "runId")]
    pub run_id: String,
    pub workflow: WorkflowGraph,
    pub logs: Vec<LogEntry>,
    pub status: RunStatus,
}

impl RunRecord {
    pub fn from_engine(engine: &WorkflowEngine) -> Self {
        Self {
            run_id: engine.run_id().to_string(),
            workflow: engine.graph().clone(),
            logs: engine.result().logs,
            status: engine.status(),
        }
    }

    pub fn file_name(run_id: &str) -> String {
        format!("run_{run_id}.json")
    }

    /// Writes the record under `dir`, creating the directory if needed.
    /// A later save for the same run id overwrites the earlier file.
    pub async fn save(&self, dir: &Path) -> Result<PathBuf, EngineError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(Self::file_name(&self.run_id));
        let body = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}
