//! Execution side of generated operators.

pub mod primitives;
pub mod row_type;
pub mod rowwise;
