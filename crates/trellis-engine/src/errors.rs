use thiserror::Error;

/// Failures internal to one node execution or to record persistence.
///
/// `run()`/`resume()` never return these to the caller: a node-boundary
/// failure is logged against the node and surfaces as `RunStatus::Failed`
/// in the result snapshot. The log is the error channel.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    NodeExecution(String),
    #[error("failed writing run record: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed encoding run record: {0}")]
    Encode(#[from] serde_json::Error),
}
