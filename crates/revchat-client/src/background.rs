//! Supervised fire-and-forget jobs.
//!
//! Jobs run on the tokio runtime; their errors are logged and never reach
//! the operation that spawned them.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use crate::ChatError;

/// Jobs are aborted when the set is dropped; call [`BackgroundTasks::drain`]
/// first to let them finish.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    tasks: Mutex<JoinSet<()>>,
}

fn log_join(result: Result<(), JoinError>) {
    if let Err(e) = result {
        warn!(error = %e, "background task aborted");
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn `job`. Must be called from within a tokio runtime.
    pub fn submit<F>(&self, name: &'static str, job: F)
    where
        F: Future<Output = Result<(), ChatError>> + Send + 'static,
    {
        let mut tasks = self.lock();
        while let Some(result) = tasks.try_join_next() {
            log_join(result);
        }
        tasks.spawn(async move {
            match job.await {
                Ok(()) => debug!(task = name, "background task finished"),
                Err(e) => warn!(task = name, error = %e, "background task failed"),
            }
        });
    }

    /// Jobs spawned and not yet reaped.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Wait for every outstanding job, including ones submitted meanwhile.
    pub async fn drain(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.lock());
            if tasks.is_empty() {
                return;
            }
            while let Some(result) = tasks.join_next().await {
                log_join(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn drain_waits_for_jobs() {
        let tasks = BackgroundTasks::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            tasks.submit("count", async move {
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        tasks.drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn failing_job_is_contained() {
        let tasks = BackgroundTasks::new();
        tasks.submit("fails", async { Err(ChatError::RateLimited) });
        tasks.drain().await;
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn submit_reaps_finished_jobs() {
        let tasks = BackgroundTasks::new();
        tasks.submit("quick", async { Ok(()) });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        tasks.submit("quick", async { Ok(()) });
        assert_eq!(tasks.pending(), 1);
        tasks.drain().await;
    }

    #[tokio::test]
    async fn dropping_aborts_outstanding_jobs() {
        let tasks = BackgroundTasks::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tasks.submit("never", async move {
            let _tx = tx;
            std::future::pending::<()>().await;
            Ok(())
        });
        drop(tasks);
        assert!(rx.await.is_err());
    }
}
