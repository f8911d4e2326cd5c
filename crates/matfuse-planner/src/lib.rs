#![forbid(unsafe_code)]
//! matfuse-planner: logical operator graph → placement → physical operators.
//!
//! Design:
//! - `hop` holds the logical graph as an arena (`HopGraph`) indexed by `HopId`;
//!   consumers are kept as non-owning `HopId` lists.
//! - `reorg` implements the reorg family (transpose, diag vector↔matrix):
//!   size propagation, memory estimates, and placement.
//! - `cost` is the pure byte-size model placement decisions compare against.
//! - `lops` defines physical operator nodes; `lower` builds them, memoized
//!   once per logical node.
//! - `dsl::yaml` is a tiny graph descriptor used by the CLI and tests.
//!
//! NOTE: no execution here. Running a physical plan is the backend's job
//! (`matfuse-exec` ships a local reference interpreter).

pub mod cost;
pub mod dsl;
pub mod error;
pub mod hop;
pub mod lops;
pub mod lower;
pub mod reorg;

pub use cost::{estimate_size, estimate_size_exact_sparsity};
pub use dsl::yaml::{parse_yaml_graph, ParsedGraph};
pub use error::{LopError, PlanError};
pub use hop::{Hop, HopGraph, HopKind};
pub use lops::{
    AggOp, CorrectionLocation, Direction, GroupOp, Lop, LopKind, OutputParameters,
    PhysicalProgram, TransformOp,
};
pub use reorg::ReorgOp;
