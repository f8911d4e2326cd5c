#![forbid(unsafe_code)]
//! matfuse-mem: hard memory budgeting and per-task scratch memory.
//!
//! This crate provides concrete implementations for the *interfaces* defined
//! in `matfuse-core::budget`. Fused kernels acquire their intermediate vectors
//! through a [`ScratchArena`], which accounts its bytes against the budget with
//! an RAII guard. Arenas are owned by exactly one task and never shared.

pub mod error;
pub mod guard;
pub mod scratch;
pub mod tracking;

pub use error::{Error, Result};
pub use guard::{BudgetGuardImpl, MemoryBudgetImpl};
pub use scratch::ScratchArena;
pub use tracking::PeakTracker;
