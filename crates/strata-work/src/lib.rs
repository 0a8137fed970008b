//! Background work queue: generation closures run on a fixed worker pool and
//! their results are handed back to the owning thread on `drain`.

mod error;
mod pool;
mod queue;

pub use error::{SpawnError, SubmitError, TaskError};
pub use queue::{DEFAULT_QUEUE_CAPACITY, WorkQueue};
