//! Fixed set of worker threads fed by a bounded channel.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, TrySendError, bounded};

use crate::error::SpawnError;

pub(crate) type Job = Box<dyn FnOnce() + Send>;

/// Lock a mutex whose contents stay consistent even if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct WorkerPool {
    /// `None` once the pool is closed.
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl WorkerPool {
    pub(crate) fn new(worker_count: usize, capacity: usize) -> Result<Self, SpawnError> {
        let (sender, receiver) = bounded::<Job>(capacity.max(1));
        let worker_count = worker_count.max(1);

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("strata-worker-{index}"))
                .spawn(move || {
                    tracing::debug!(worker = index, "worker started");
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                    tracing::debug!(worker = index, "worker exiting");
                });
            match handle {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    // Closing the channel lets the workers already spawned exit.
                    drop(sender);
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(SpawnError(err));
                }
            }
        }

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            worker_count,
        })
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Hand a job to the workers without blocking.
    pub(crate) fn try_send(&self, job: Job) -> Result<(), TrySendError<Job>> {
        match lock(&self.sender).as_ref() {
            Some(sender) => sender.try_send(job),
            None => Err(TrySendError::Disconnected(job)),
        }
    }

    /// Send `remaining` (blocking until the workers make room), close the
    /// channel and join every worker.
    pub(crate) fn close(&self, remaining: impl IntoIterator<Item = Job>) {
        let Some(sender) = lock(&self.sender).take() else {
            return;
        };
        for job in remaining {
            if sender.send(job).is_err() {
                break;
            }
        }
        drop(sender);

        let workers = std::mem::take(&mut *lock(&self.workers));
        for worker in workers {
            if worker.join().is_err() {
                tracing::warn!("worker thread terminated abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close(std::iter::empty());
    }
}
