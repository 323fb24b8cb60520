//! Queue abstraction for scan jobs.
//!
//! The reconciler's correctness has to hold under redelivery, not under
//! any particular broker, so the queue is a trait with two
//! implementations: [`MemoryQueue`] for tests and single-process use,
//! and [`RedisQueue`] (Redis Streams + consumer group) for durable
//! production dispatch with at-least-once delivery.

mod memory;
mod redis;

pub use self::memory::MemoryQueue;
pub use self::redis::{RedisQueue, RedisQueueConfig};

use crate::error::Result;
use crate::job::ScanJob;
use std::time::Duration;

/// A job pulled off a queue, paired with the broker's receipt so it can
/// be acknowledged (or not) once processed.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job: ScanJob,
    /// Broker-side message id. Opaque; empty for the in-memory queue.
    pub(crate) receipt: String,
}

/// Durable-ish job transport with at-least-once semantics.
///
/// A popped job that is never acked may be delivered again (to the same
/// or another worker), so consumers must be idempotent - which the
/// catalog's natural-key upserts guarantee for scan jobs.
#[async_trait::async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job for background execution. Returns immediately;
    /// the job id inside is the caller's only receipt.
    async fn enqueue(&self, job: &ScanJob) -> Result<()>;

    /// Pop the next job, blocking up to `timeout`. `Ok(None)` means the
    /// queue stayed empty for the whole window.
    async fn pop(&self, worker_id: &str, timeout: Duration) -> Result<Option<Delivery>>;

    /// Acknowledge successful processing.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Report failed processing. Whether and when the job is
    /// redelivered is the queue's own retry policy.
    async fn nack(&self, delivery: &Delivery, reason: &str) -> Result<()>;
}
