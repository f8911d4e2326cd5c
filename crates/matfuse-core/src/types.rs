//! Placement and optimizer-mode enums shared by the planner and runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a physical operator executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecType {
    /// In-process, single node.
    Local,
    /// On the cluster backend.
    Distributed,
}

impl fmt::Display for ExecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecType::Local => f.write_str("LOCAL"),
            ExecType::Distributed => f.write_str("DIST"),
        }
    }
}

/// How placement decisions are made when nothing is forced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationType {
    /// Compare memory estimates against the configured local budget.
    #[default]
    MemoryBased,
    /// Dimension thresholds only (vectors and small matrices run locally).
    Heuristic,
}

impl std::str::FromStr for OptimizationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "memory_based" => Ok(OptimizationType::MemoryBased),
            "heuristic" => Ok(OptimizationType::Heuristic),
            other => Err(format!("unknown optimization type '{other}'")),
        }
    }
}

impl std::str::FromStr for ExecType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" | "cp" => Ok(ExecType::Local),
            "dist" | "distributed" | "mr" => Ok(ExecType::Distributed),
            other => Err(format!("unknown exec type '{other}'")),
        }
    }
}
