//! Byte-size model for matrix outputs.
//!
//! All functions are pure. A block is costed as dense or sparse depending on
//! which in-memory format it would actually use, so the estimate for the same
//! number of non-zeros changes with the row/column split: sparse blocks pay a
//! per-row overhead, dense blocks pay for every cell.

/// Density below which multi-column blocks are held in sparse form.
pub const SPARSITY_TURN_POINT: f64 = 0.4;

/// Fixed object overhead of a matrix block.
const BLOCK_HEADER_BYTES: f64 = 44.0;
/// Overhead of one backing array.
const ARRAY_HEADER_BYTES: f64 = 16.0;
/// Overhead of one sparse row (value/index arrays and bookkeeping).
const SPARSE_ROW_HEADER_BYTES: f64 = 116.0;
/// Bytes per stored sparse entry (f64 value + u32 index).
const SPARSE_ENTRY_BYTES: f64 = 12.0;
/// Minimum capacity of an allocated sparse row.
const SPARSE_ROW_MIN_CAPACITY: f64 = 4.0;

/// Dense row-major size.
pub fn estimate_size_dense(rows: u64, cols: u64) -> u64 {
    let cells = rows as f64 * cols as f64;
    (BLOCK_HEADER_BYTES + ARRAY_HEADER_BYTES + 8.0 * cells) as u64
}

/// Compressed-row size at the given density.
pub fn estimate_size_sparse(rows: u64, cols: u64, sparsity: f64) -> u64 {
    let (r, c) = (rows as f64, cols as f64);
    let per_row = (sparsity * c).ceil().max(SPARSE_ROW_MIN_CAPACITY);
    let non_empty_rows = r.min((sparsity * r * c).ceil());
    let size = BLOCK_HEADER_BYTES
        + ARRAY_HEADER_BYTES
        + 8.0 * r
        + non_empty_rows * (SPARSE_ROW_HEADER_BYTES + SPARSE_ENTRY_BYTES * per_row);
    size as u64
}

/// Whether a block with these characteristics would be held sparse.
pub fn eval_sparse_format(rows: u64, cols: u64, nnz: u64) -> bool {
    let cells = rows as f64 * cols as f64;
    if cells == 0.0 {
        return false;
    }
    cols > 1 && (nnz as f64 / cells) < SPARSITY_TURN_POINT
}

/// Size of a `rows x cols` block with the given density, in whichever
/// format it would be stored.
pub fn estimate_size_exact_sparsity(rows: u64, cols: u64, sparsity: f64) -> u64 {
    let sparsity = sparsity.clamp(0.0, 1.0);
    let nnz = (sparsity * rows as f64 * cols as f64).ceil() as u64;
    if eval_sparse_format(rows, cols, nnz) {
        estimate_size_sparse(rows, cols, sparsity)
    } else {
        estimate_size_dense(rows, cols)
    }
}

/// Size from (rows, cols, nnz-or-unknown). Unknown or zero nnz is costed
/// as fully dense.
pub fn estimate_size(rows: u64, cols: u64, nnz: Option<u64>) -> u64 {
    let cells = rows as f64 * cols as f64;
    let sparsity = match nnz {
        Some(n) if n > 0 && cells > 0.0 => n as f64 / cells,
        _ => 1.0,
    };
    estimate_size_exact_sparsity(rows, cols, sparsity)
}
