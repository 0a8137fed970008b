/// Why a submitted task completed without a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("worker task panicked: {0}")]
    Panicked(String),
}

/// Errors returned by [`WorkQueue::submit`](crate::WorkQueue::submit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("work queue has been shut down")]
    ShutDown,
}

/// The operating system refused to start a worker thread.
#[derive(Debug, thiserror::Error)]
#[error("failed to spawn worker thread: {0}")]
pub struct SpawnError(#[from] pub std::io::Error);
