//! Convenient re-exports for downstream crates.

pub use crate::config::{ExecConfig, OptimizerConfig};
pub use crate::dims::DataCharacteristics;
pub use crate::error::{Error, Result};
pub use crate::id::{HopId, LopId, SourcePosition};
pub use crate::manifest::RunManifest;
pub use crate::matrix::{CompressedBlock, DenseBlock, MatrixBlock, SparseBlock};
pub use crate::types::{ExecType, OptimizationType};
