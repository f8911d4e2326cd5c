#![forbid(unsafe_code)]
//! matfuse-exec: fused row-wise kernels and local plan execution.
//!
//! - `codegen` runs generated per-row logic (`RowKernel`) over dense, sparse
//!   and compressed blocks, serially or as a fan-out over a worker pool.
//! - `side_input` and `partition` are the per-call services the kernel
//!   operator relies on.
//! - `pool` caches one worker pool per degree of parallelism.
//! - `runtime` interprets lowered physical plans locally.

pub mod codegen;
pub mod error;
pub mod metrics;
pub mod partition;
pub mod pool;
pub mod runtime;
pub mod side_input;

pub use codegen::primitives;
pub use codegen::row_type::RowType;
pub use codegen::rowwise::{ExecOptions, FusedRowwise, RowEnv, RowKernel};
pub use error::{ExecError, KernelError};
pub use runtime::{LopExecutor, RunOutput};
pub use side_input::SideInput;
