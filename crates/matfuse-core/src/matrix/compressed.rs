//! Column-group compressed block.
//!
//! Columns are partitioned into groups; each group stores a dictionary of
//! distinct value tuples (one entry per column of the group) and, per row, a
//! code pointing into that dictionary. Rows are materialized on demand through
//! [`DenseRowCursor`], which decompresses a small batch of rows at a time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matrix::dense::DenseBlock;

/// Rows decompressed per cursor refill.
const CURSOR_BATCH_ROWS: usize = 32;

/// Dictionary-encoded group of columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColGroup {
    /// Column indexes covered by this group, ascending.
    cols: Vec<usize>,
    /// Distinct tuples, `cols.len()` values each, laid out back to back.
    dict: Vec<f64>,
    /// Per-row tuple index into `dict`.
    codes: Vec<u32>,
}

impl ColGroup {
    /// Dictionary tuples are keyed on their bit patterns and numbered in
    /// first-seen row order.
    fn encode(d: &DenseBlock, cols: Vec<usize>) -> Result<Self> {
        let mut dict: Vec<f64> = Vec::new();
        let mut index: HashMap<Vec<u64>, u32> = HashMap::new();
        let mut codes = Vec::with_capacity(d.rows());
        for i in 0..d.rows() {
            let key: Vec<u64> = cols.iter().map(|&j| d.get(i, j).to_bits()).collect();
            let code = match index.get(&key) {
                Some(&c) => c,
                None => {
                    let c = u32::try_from(index.len())
                        .map_err(|_| Error::Shape("column group dictionary overflow".into()))?;
                    dict.extend(key.iter().map(|&b| f64::from_bits(b)));
                    index.insert(key, c);
                    c
                }
            };
            codes.push(code);
        }
        Ok(Self { cols, dict, codes })
    }

    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    pub fn num_tuples(&self) -> usize {
        if self.cols.is_empty() {
            0
        } else {
            self.dict.len() / self.cols.len()
        }
    }

    #[inline]
    fn tuple(&self, row: usize) -> &[f64] {
        let w = self.cols.len();
        let c = self.codes[row] as usize;
        &self.dict[c * w..(c + 1) * w]
    }

    /// Scatter row `row` of this group into a dense row buffer.
    #[inline]
    fn decompress_row(&self, row: usize, out: &mut [f64]) {
        for (v, &j) in self.tuple(row).iter().zip(&self.cols) {
            out[j] = *v;
        }
    }

    fn nnz(&self) -> u64 {
        (0..self.codes.len())
            .map(|i| self.tuple(i).iter().filter(|v| **v != 0.0).count() as u64)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedBlock {
    rows: usize,
    cols: usize,
    groups: Vec<ColGroup>,
    nnz: u64,
}

impl CompressedBlock {
    /// Compress a dense block, grouping `group_width` adjacent columns.
    pub fn compress(d: &DenseBlock, group_width: usize) -> Result<Self> {
        if group_width == 0 {
            return Err(Error::Config("group width must be positive".into()));
        }
        let mut groups = Vec::with_capacity(d.cols().div_ceil(group_width));
        let mut start = 0;
        while start < d.cols() {
            let end = (start + group_width).min(d.cols());
            groups.push(ColGroup::encode(d, (start..end).collect())?);
            start = end;
        }
        let nnz = groups.iter().map(ColGroup::nnz).sum();
        Ok(Self {
            rows: d.rows(),
            cols: d.cols(),
            groups,
            nnz,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn nnz(&self) -> u64 {
        self.nnz
    }

    pub fn groups(&self) -> &[ColGroup] {
        &self.groups
    }

    /// True if no cell is non-zero.
    pub fn is_empty_block(&self) -> bool {
        self.nnz == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        for g in &self.groups {
            if let Ok(k) = g.cols.binary_search(&j) {
                return g.tuple(i)[k];
            }
        }
        0.0
    }

    /// Decompressing cursor over rows `[rl, ru)`.
    pub fn dense_row_cursor(&self, rl: usize, ru: usize) -> DenseRowCursor<'_> {
        DenseRowCursor {
            block: self,
            next: rl,
            end: ru.min(self.rows),
            batch_start: rl,
            batch_len: 0,
            buf: Vec::new(),
        }
    }

    pub fn decompress(&self) -> DenseBlock {
        let mut d = DenseBlock::new(self.rows, self.cols);
        {
            let cols = self.cols;
            let out = d.values_mut();
            for i in 0..self.rows {
                let row = &mut out[i * cols..(i + 1) * cols];
                for g in &self.groups {
                    g.decompress_row(i, row);
                }
            }
        }
        d.set_non_zeros(self.nnz);
        d
    }
}

/// Lending cursor yielding decompressed rows in order.
///
/// Rows are decompressed in batches into an internal buffer; the returned
/// slice is valid until the next call.
pub struct DenseRowCursor<'a> {
    block: &'a CompressedBlock,
    next: usize,
    end: usize,
    batch_start: usize,
    batch_len: usize,
    buf: Vec<f64>,
}

impl<'a> DenseRowCursor<'a> {
    /// Index of the row the next `next_row` call returns.
    pub fn position(&self) -> usize {
        self.next
    }

    pub fn next_row(&mut self) -> Option<&[f64]> {
        if self.next >= self.end {
            return None;
        }
        let cols = self.block.cols;
        if self.next >= self.batch_start + self.batch_len {
            self.refill(cols);
        }
        let off = (self.next - self.batch_start) * cols;
        self.next += 1;
        Some(&self.buf[off..off + cols])
    }

    fn refill(&mut self, cols: usize) {
        let len = CURSOR_BATCH_ROWS.min(self.end - self.next);
        self.batch_start = self.next;
        self.batch_len = len;
        self.buf.clear();
        self.buf.resize(len * cols, 0.0);
        for r in 0..len {
            let row = &mut self.buf[r * cols..(r + 1) * cols];
            for g in &self.block.groups {
                g.decompress_row(self.batch_start + r, row);
            }
        }
    }
}
