//! Per-root worker pools.
//!
//! Each project root owns a [`WorkerPool`]: a semaphore-bounded wrapper
//! over `tokio::spawn` that records the join handle of every submitted
//! job. [`WorkerPool::drain`] awaits those handles, so it waits for jobs
//! that are queued but have not been polled yet, not only for jobs
//! already holding a pool slot. Draining never cancels a job mid-flight.

use std::future::Future;
use std::sync::Arc;

use cw_core::RootId;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::warn;

/// A bounded pool of async jobs for one root. Clones share the pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
    capacity: usize,
}

impl WorkerPool {
    /// Creates a pool running at most `capacity` jobs at once.
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            handles: Arc::new(Mutex::new(Vec::new())),
            capacity,
        }
    }

    /// Submits a job. It starts once a pool slot is free.
    pub fn spawn<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let handle = tokio::spawn(async move {
            // acquire fails only if the semaphore is closed, which the
            // pool never does
            let Ok(_permit) = semaphore.acquire().await else {
                return;
            };
            job.await;
        });
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Waits until every job submitted before this call has finished.
    ///
    /// Jobs that are queued but have not started yet count: the pool
    /// awaits their join handles, not just the occupied slots.
    pub async fn drain(&self) {
        let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in pending {
            if let Err(error) = handle.await {
                warn!(%error, "Pool job did not run to completion");
            }
        }
    }

    /// Jobs currently holding a pool slot.
    #[must_use]
    pub fn active(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}

/// Marker for one outstanding parse for a root.
///
/// Held in the root's state while the parse runs; the parse task clears
/// it on completion, so `Some` means "a parse is in flight" and a second
/// one must not be spawned.
#[derive(Debug, Clone, Copy)]
pub struct ParseJob {
    /// The root the parse will install into.
    pub root: RootId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_drain_waits_for_jobs() {
        let pool = WorkerPool::new(2);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let done = Arc::clone(&done);
            pool.spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert_eq!(pool.active(), 0);
    }

    #[tokio::test]
    async fn test_drain_waits_for_job_not_yet_started() {
        // current-thread test runtime: the spawned task has not been
        // polled when drain begins, so it holds no pool slot yet
        let pool = WorkerPool::new(2);
        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        pool.spawn(async move {
            flag.store(1, Ordering::SeqCst);
        });

        pool.drain().await;
        assert_eq!(
            done.load(Ordering::SeqCst),
            1,
            "drain must wait for queued jobs, not only running ones"
        );
    }

    #[tokio::test]
    async fn test_capacity_bounds_concurrency() {
        let pool = WorkerPool::new(1);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.spawn(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        pool.drain().await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pool_usable_after_drain() {
        let pool = WorkerPool::new(1);
        pool.drain().await;

        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        pool.spawn(async move {
            flag.store(1, Ordering::SeqCst);
        });
        pool.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
