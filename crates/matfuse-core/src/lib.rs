#![forbid(unsafe_code)]
//! matfuse-core: shared vocabulary for the matfuse compiler and runtime.
//!
//! Everything here is plain data plus pure helpers:
//! - strongly typed ids for logical (`HopId`) and physical (`LopId`) nodes,
//! - data characteristics (dims, block sizes, nnz) with an "unknown" state,
//! - placement/optimizer enums and the serializable configuration,
//! - the three physical matrix representations consumed by fused kernels,
//! - memory-budget traits implemented in `matfuse-mem`.
//!
//! No threads, no I/O.

pub mod budget;
pub mod config;
pub mod dims;
pub mod error;
pub mod hash;
pub mod id;
pub mod manifest;
pub mod matrix;
pub mod prelude;
pub mod types;

/// Crate version, embedded into plan fingerprints.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
