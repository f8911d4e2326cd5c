//! Output shape and aggregation semantics of a row-wise operator.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowType {
    /// One output row per input row, same width.
    NoAgg,
    /// One output row per input row, multiplied with a side matrix B1.
    NoAggB1,
    /// One output row per input row, fixed width.
    NoAggConst,
    /// Single scalar over all rows.
    FullAgg,
    /// One value per row.
    RowAgg,
    /// Column aggregate as a row vector.
    ColAgg,
    /// Column aggregate as a column vector.
    ColAggT,
    /// Column aggregate through B1 (`n2 x n`).
    ColAggB1,
    /// Transposed column aggregate through B1 (`n x n2`).
    ColAggB1T,
    /// Column aggregate through B1 reduced to a row vector.
    ColAggB1R,
    /// Column aggregate of fixed width.
    ColAggConst,
}

impl RowType {
    pub const ALL: [RowType; 11] = [
        RowType::NoAgg,
        RowType::NoAggB1,
        RowType::NoAggConst,
        RowType::FullAgg,
        RowType::RowAgg,
        RowType::ColAgg,
        RowType::ColAggT,
        RowType::ColAggB1,
        RowType::ColAggB1T,
        RowType::ColAggB1R,
        RowType::ColAggConst,
    ];

    pub fn is_column_agg(self) -> bool {
        matches!(
            self,
            RowType::ColAgg
                | RowType::ColAggT
                | RowType::ColAggB1
                | RowType::ColAggB1T
                | RowType::ColAggB1R
                | RowType::ColAggConst
        )
    }

    pub fn is_b1(self) -> bool {
        matches!(
            self,
            RowType::NoAggB1 | RowType::ColAggB1 | RowType::ColAggB1T | RowType::ColAggB1R
        )
    }

    pub fn is_b1_column_agg(self) -> bool {
        matches!(self, RowType::ColAggB1 | RowType::ColAggB1T)
    }

    /// Whether the second output dimension is fixed by the operator itself.
    pub fn is_const_dim2(self, const_dim2: Option<usize>) -> bool {
        matches!(self, RowType::NoAggConst | RowType::ColAggConst)
            || (const_dim2.is_some() && self.is_b1())
    }

    /// Each input row owns a disjoint slice of the output.
    pub fn writes_rows(self) -> bool {
        matches!(
            self,
            RowType::NoAgg | RowType::NoAggB1 | RowType::NoAggConst | RowType::RowAgg
        )
    }

    /// Every row accumulates into the same output cells.
    pub fn aggregates_all_rows(self) -> bool {
        self.is_column_agg() || self == RowType::FullAgg
    }

    /// Output dims for an `m x n` primary input. `None` if the formula needs
    /// `n2` or the constant and it is not known.
    pub fn output_shape(
        self,
        m: usize,
        n: usize,
        n2: Option<usize>,
        const_dim2: Option<usize>,
    ) -> Option<(usize, usize)> {
        let shape = match self {
            RowType::NoAgg => (m, n),
            RowType::NoAggB1 => (m, n2?),
            RowType::NoAggConst => (m, const_dim2?),
            RowType::FullAgg => (1, 1),
            RowType::RowAgg => (m, 1),
            RowType::ColAgg => (1, n),
            RowType::ColAggT => (n, 1),
            RowType::ColAggB1 => (n2?, n),
            RowType::ColAggB1T => (n, n2?),
            RowType::ColAggB1R => (1, n2?),
            RowType::ColAggConst => (1, const_dim2?),
        };
        Some(shape)
    }
}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RowType::NoAgg => "NO_AGG",
            RowType::NoAggB1 => "NO_AGG_B1",
            RowType::NoAggConst => "NO_AGG_CONST",
            RowType::FullAgg => "FULL_AGG",
            RowType::RowAgg => "ROW_AGG",
            RowType::ColAgg => "COL_AGG",
            RowType::ColAggT => "COL_AGG_T",
            RowType::ColAggB1 => "COL_AGG_B1",
            RowType::ColAggB1T => "COL_AGG_B1_T",
            RowType::ColAggB1R => "COL_AGG_B1R",
            RowType::ColAggConst => "COL_AGG_CONST",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for RowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RowType::ALL
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown row type '{s}'"))
    }
}
