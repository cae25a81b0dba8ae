use crate::engine::WorkflowEngine;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Mutex as AsyncMutex;

/// Handle to a registered run. The async mutex serializes run/resume for
/// one run id; distinct runs proceed independently.
pub type SharedEngine = Arc<AsyncMutex<WorkflowEngine>>;

/// In-memory index of live runs, keyed by run id.
///
/// Holds paused runs across requests until the caller removes them; there
/// is no eviction policy. The inner lock guards only the map itself, never
/// a run's execution.
#[derive(Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<String, SharedEngine>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an engine under its run id and returns the shared handle.
    /// Re-inserting an id replaces the previous entry.
    pub fn insert(&self, engine: WorkflowEngine) -> SharedEngine {
        let run_id = engine.run_id().to_string();
        let handle = Arc::new(AsyncMutex::new(engine));
        self.runs().insert(run_id, Arc::clone(&handle));
        handle
    }

    pub fn get(&self, run_id: &str) -> Option<SharedEngine> {
        self.runs().get(run_id).cloned()
    }

    pub fn remove(&self, run_id: &str) -> Option<SharedEngine> {
        self.runs().remove(run_id)
    }

    pub fn len(&self) -> usize {
        self.runs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs().is_empty()
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<String, SharedEngine>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
