//! Workflow execution core for Trellis.
//!
//! Runs a directed graph of typed nodes server-side: walk the graph one
//! node at a time, call the model adapter for agent nodes, branch on
//! substring conditions, and suspend/resume across requests at approval
//! nodes. The append-only execution log is the run's observability and
//! error channel.

pub mod engine;
pub mod errors;
pub mod graph;
pub mod handlers;
pub mod log;
pub mod record;
pub mod registry;
pub mod resume;
pub mod state;

pub use engine::*;
pub use errors::*;
pub use graph::*;
pub use log::*;
pub use record::*;
pub use registry::*;
pub use resume::*;
pub use state::*;
