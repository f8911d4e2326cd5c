use thiserror::Error;

use matfuse_core::id::{HopId, SourcePosition};

/// Result type local to matfuse-planner.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Failures building a single physical node.
#[derive(Debug, Error)]
pub enum LopError {
    #[error("unsupported partial aggregate {op} along {direction}")]
    UnsupportedAggregate { op: String, direction: String },

    #[error("aggregate expects a group input, got {0}")]
    ExpectedGroup(String),
}

#[derive(Debug, Error)]
pub enum PlanError {
    /// Compile-time failure while lowering a logical node; never retried.
    #[error("{position}: lowering {hop} ('{name}') failed: {msg}")]
    Lowering {
        hop: HopId,
        name: String,
        position: SourcePosition,
        msg: String,
        #[source]
        source: Option<LopError>,
    },

    #[error("unknown hop {0}")]
    UnknownHop(HopId),

    #[error("invalid graph: {0}")]
    Graph(String),

    #[error(transparent)]
    Core(#[from] matfuse_core::error::Error),
}
