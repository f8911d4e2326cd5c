//! Strongly-typed identifiers used across the compiler.
//!
//! Logical nodes are addressed by `HopId` (an index into the owning graph),
//! physical nodes by `LopId`. Downstream crates should *not* pass raw integers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! new_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

new_id!(HopId);
new_id!(LopId);

impl HopId {
    /// Position of the node inside its graph arena.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

static NEXT_LOP_ID: AtomicU64 = AtomicU64::new(1);

impl LopId {
    /// Allocate a fresh id. Physical nodes outlive the graph that produced
    /// them (the backend owns them), so ids come from a process-wide counter.
    pub fn next() -> Self {
        Self(NEXT_LOP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Source location of the expression a node was compiled from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub begin_line: u32,
    pub begin_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourcePosition {
    pub const fn new(begin_line: u32, begin_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            begin_line,
            begin_column,
            end_line,
            end_column,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}:{} - line {}:{}",
            self.begin_line, self.begin_column, self.end_line, self.end_column
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lop_ids_are_unique() {
        let a = LopId::next();
        let b = LopId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn display_formats() {
        assert_eq!(HopId::new(3).to_string(), "HopId(3)");
        assert_eq!(
            SourcePosition::new(1, 2, 1, 9).to_string(),
            "line 1:2 - line 1:9"
        );
    }
}
