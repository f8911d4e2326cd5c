use thiserror::Error;

/// Failure raised by generated row logic.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("row {row}: {msg}")]
    Row { row: usize, msg: String },

    #[error("side input {index} requested, {count} available")]
    MissingSideInput { index: usize, count: usize },

    #[error(transparent)]
    Scratch(#[from] matfuse_mem::Error),
}

#[derive(Debug, Error)]
pub enum ExecError {
    /// Rejected before any work started.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// First failure of a parallel run; the other task results are dropped.
    #[error("task {task} failed")]
    Task {
        task: usize,
        #[source]
        source: KernelError,
    },

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Memory(#[from] matfuse_mem::Error),

    #[error("plan execution: {0}")]
    Plan(String),

    #[error("worker pool: {0}")]
    Pool(String),

    #[error(transparent)]
    Shape(#[from] matfuse_core::error::Error),
}
