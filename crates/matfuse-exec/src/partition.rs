//! Row-range partitioning for parallel kernel runs.
//!
//! Compressed inputs are cut at multiples of the compression row block so
//! no task decompresses a block another task also touches. Everything else
//! is balanced: by row count for small inputs (one chunk per task), and for
//! large inputs into more, smaller chunks; for large sparse inputs the cut
//! points follow the non-zero distribution.

use std::ops::Range;

use matfuse_core::config::ExecConfig;
use matfuse_core::matrix::MatrixBlock;

/// Chunk multiplier for large inputs.
const OVERSUBSCRIBE: usize = 8;
/// Minimum rows per chunk for large inputs.
const MIN_ROWS_PER_CHUNK: usize = 32;

/// `val` rounded up to a multiple of `factor`, at least `factor`.
fn round_to_next(val: usize, factor: usize) -> usize {
    let v = val.max(factor);
    v.div_ceil(factor) * factor
}

/// `min(len, k)` chunks whose sizes differ by at most one.
pub fn balanced_block_sizes(len: usize, k: usize) -> Vec<usize> {
    let nk = len.min(k.max(1));
    if nk == 0 {
        return Vec::new();
    }
    let (base, rest) = (len / nk, len % nk);
    (0..nk).map(|i| base + usize::from(i < rest)).collect()
}

/// Chunks of `ceil(len / k)` rows rounded up to a multiple of `align`.
pub fn aligned_block_sizes(len: usize, k: usize, align: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let align = align.max(1);
    let blklen = len.div_ceil(k.max(1)).div_ceil(align) * align;
    (0..len).step_by(blklen).map(|i| blklen.min(len - i)).collect()
}

/// Number of chunks for an input of `len` rows; `k` when `const_k`.
pub fn num_chunks(len: usize, k: usize, const_k: bool) -> usize {
    if const_k {
        k
    } else {
        round_to_next((OVERSUBSCRIBE * k).min(len / MIN_ROWS_PER_CHUNK), k)
    }
}

/// `nk` contiguous chunks with roughly equal total `weight`. Every chunk
/// has at least one row.
pub fn weighted_block_sizes(len: usize, nk: usize, weight: impl Fn(usize) -> u64) -> Vec<usize> {
    let nk = len.min(nk.max(1));
    if nk == 0 {
        return Vec::new();
    }
    let total: u64 = (0..len).map(&weight).sum();
    let mut sizes = Vec::with_capacity(nk);
    let (mut start, mut acc) = (0usize, 0u64);
    for i in 0..len {
        acc += weight(i);
        let chunks_left = nk - sizes.len();
        let rows_left = len - (i + 1);
        let target = total * (sizes.len() as u64 + 1) / nk as u64;
        // cut when the target is reached, but leave a row for each remaining chunk
        if chunks_left > 1
            && rows_left >= chunks_left - 1
            && (acc >= target || rows_left < chunks_left)
        {
            sizes.push(i + 1 - start);
            start = i + 1;
        }
    }
    sizes.push(len - start);
    sizes
}

fn to_ranges(sizes: Vec<usize>) -> Vec<Range<usize>> {
    let mut lb = 0;
    sizes
        .into_iter()
        .filter(|&s| s > 0)
        .map(|s| {
            let r = lb..lb + s;
            lb += s;
            r
        })
        .collect()
}

/// Row ranges covering `[0, rows)` of the primary input for `k` workers.
pub fn plan_row_ranges(a: &MatrixBlock, k: usize, cfg: &ExecConfig) -> Vec<Range<usize>> {
    let m = a.rows();
    let sizes = match a {
        MatrixBlock::Compressed(_) => aligned_block_sizes(m, k, cfg.compressed_block_rows),
        _ => {
            let const_k = a.cells() < 16 * cfg.par_numcell_threshold;
            let nk = num_chunks(m, k, const_k);
            match a {
                MatrixBlock::Sparse(s) if !const_k => {
                    weighted_block_sizes(m, nk, |i| s.size(i) as u64 + 1)
                }
                _ => balanced_block_sizes(m, nk),
            }
        }
    };
    to_ranges(sizes)
}
