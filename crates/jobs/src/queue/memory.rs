//! In-memory queue for tests and single-process setups.

use crate::error::Result;
use crate::job::ScanJob;
use crate::queue::{Delivery, JobQueue};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// A process-local FIFO queue.
///
/// Delivery is at-most-once here: a popped job that is nacked is logged
/// and dropped rather than requeued, so tests exercising redelivery
/// re-enqueue explicitly. Durability and retry policy are what
/// [`RedisQueue`](crate::RedisQueue) is for.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    jobs: Mutex<VecDeque<ScanJob>>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs currently waiting.
    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: &ScanJob) -> Result<()> {
        self.jobs.lock().await.push_back(job.clone());
        self.notify.notify_one();
        Ok(())
    }

    async fn pop(&self, _worker_id: &str, timeout: Duration) -> Result<Option<Delivery>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(job) = self.jobs.lock().await.pop_front() {
                return Ok(Some(Delivery { job, receipt: String::new() }));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::select! {
                _ = self.notify.notified() => {},
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            }
        }
    }

    async fn ack(&self, _delivery: &Delivery) -> Result<()> {
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, reason: &str) -> Result<()> {
        tracing::warn!(job = %delivery.job.id, reason, "job failed; in-memory queue does not retry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = MemoryQueue::new();
        let first = ScanJob::new(1, "/a");
        let second = ScanJob::new(2, "/b");
        queue.enqueue(&first).await.unwrap();
        queue.enqueue(&second).await.unwrap();
        assert_eq!(queue.len().await, 2);
        let popped = queue.pop("w1", Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(popped.job, first);
        let popped = queue.pop("w1", Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(popped.job, second);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_pop_times_out() {
        let queue = MemoryQueue::new();
        let popped = queue.pop("w1", Duration::from_millis(10)).await.unwrap();
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn test_pop_wakes_on_enqueue() {
        let queue = std::sync::Arc::new(MemoryQueue::new());
        let waiter = queue.clone();
        let handle = tokio::spawn(async move { waiter.pop("w1", Duration::from_secs(5)).await });
        // Give the waiter a moment to block, then feed it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let job = ScanJob::new(3, "/c");
        queue.enqueue(&job).await.unwrap();
        let delivered = handle.await.unwrap().unwrap().unwrap();
        assert_eq!(delivered.job, job);
    }
}
