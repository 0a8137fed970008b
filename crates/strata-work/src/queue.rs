//! Owner-facing handle over the worker pool.
//!
//! Jobs run on the pool; their deliveries are parked on a completion queue
//! and only run when the owner calls [`WorkQueue::drain`] with its context.
//! That keeps every piece of owner state single-threaded.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::TrySendError;

use crate::error::{SpawnError, SubmitError, TaskError};
use crate::pool::{Job, WorkerPool, lock};

type Delivery<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Default bound on jobs waiting in the worker channel.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

struct Inner<C> {
    pool: WorkerPool,
    completed: Arc<Mutex<Vec<Delivery<C>>>>,
    /// Jobs that did not fit in the channel, oldest first.
    backlog: Mutex<VecDeque<Job>>,
    /// Submitted and not yet delivered.
    in_flight: AtomicUsize,
    shut_down: AtomicBool,
}

/// Cloneable handle to a worker pool whose results are delivered to a
/// context of type `C` on the thread that calls [`drain`](Self::drain).
///
/// Every successfully submitted task is delivered exactly once: with its
/// value, or with a [`TaskError`] if the generator panicked.
pub struct WorkQueue<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for WorkQueue<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: 'static> WorkQueue<C> {
    /// Start `threads` workers (`0` picks one per CPU) reading a channel that
    /// holds at most `capacity` waiting jobs.
    pub fn new(threads: usize, capacity: usize) -> Result<Self, SpawnError> {
        let threads = if threads == 0 { num_cpus::get() } else { threads };
        let pool = WorkerPool::new(threads, capacity)?;
        tracing::debug!(workers = pool.worker_count(), capacity, "work queue started");

        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                completed: Arc::new(Mutex::new(Vec::new())),
                backlog: Mutex::new(VecDeque::new()),
                in_flight: AtomicUsize::new(0),
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    /// One worker per CPU with the default channel capacity.
    pub fn with_defaults() -> Result<Self, SpawnError> {
        Self::new(0, DEFAULT_QUEUE_CAPACITY)
    }

    /// Run `generate` on a worker and later pass its result to `deliver` on
    /// the draining thread.
    ///
    /// Never blocks: when the channel is full the job waits in a backlog that
    /// is handed to the workers as they free up.
    pub fn submit<T, G, D>(&self, generate: G, deliver: D) -> Result<(), SubmitError>
    where
        T: Send + 'static,
        G: FnOnce() -> T + Send + 'static,
        D: FnOnce(&mut C, Result<T, TaskError>) + Send + 'static,
    {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(SubmitError::ShutDown);
        }

        let completed = Arc::clone(&self.inner.completed);
        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(generate))
                .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
            if let Err(TaskError::Panicked(message)) = &result {
                tracing::warn!(%message, "worker task panicked");
            }
            let delivery: Delivery<C> = Box::new(move |ctx| deliver(ctx, result));
            lock(&completed).push(delivery);
        });

        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        let mut backlog = lock(&self.inner.backlog);
        if !backlog.is_empty() {
            backlog.push_back(job);
            return Ok(());
        }
        match self.inner.pool.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                backlog.push_back(job);
                tracing::trace!(backlog = backlog.len(), "worker channel full, job deferred");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
                Err(SubmitError::ShutDown)
            }
        }
    }

    /// Run every delivery that has completed so far against `ctx`, returning
    /// how many ran.
    ///
    /// The completion queue is swapped out under its lock and the callbacks
    /// run after it is released, so a callback may submit more work.
    pub fn drain(&self, ctx: &mut C) -> usize {
        self.pump_backlog();

        let batch = std::mem::take(&mut *lock(&self.inner.completed));
        let delivered = batch.len();
        for delivery in batch {
            self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
            delivery(ctx);
        }

        self.pump_backlog();
        delivered
    }

    /// Tasks submitted and not yet delivered, including the backlog.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn backlog_len(&self) -> usize {
        lock(&self.inner.backlog).len()
    }

    pub fn worker_count(&self) -> usize {
        self.inner.pool.worker_count()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Stop accepting work, let the workers finish everything already
    /// submitted and join them. Pending deliveries stay queued for `drain`.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    fn pump_backlog(&self) {
        let mut backlog = lock(&self.inner.backlog);
        while let Some(job) = backlog.pop_front() {
            match self.inner.pool.try_send(job) {
                Ok(()) => {}
                // Disconnected is only reachable mid-shutdown, which flushes
                // the backlog itself.
                Err(TrySendError::Full(job) | TrySendError::Disconnected(job)) => {
                    backlog.push_front(job);
                    break;
                }
            }
        }
    }
}

impl<C> Inner<C> {
    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let remaining = std::mem::take(&mut *lock(&self.backlog));
        tracing::debug!(backlog = remaining.len(), "work queue shutting down");
        self.pool.close(remaining);
    }
}

impl<C> Drop for Inner<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
