//! Background scan dispatch and execution.
//!
//! Scans are too slow for a request/response cycle, so callers submit a
//! [`ScanJob`] through [`submit_scan`] and a [`Worker`] pool picks it up
//! later. The transport is the [`JobQueue`] trait: [`MemoryQueue`] keeps
//! everything in-process, [`RedisQueue`] rides a Redis stream with a
//! consumer group for durable at-least-once delivery across hosts.
//!
//! Jobs are fire-and-forget. The submitted id is a receipt, not a
//! status handle; results land in the catalog and in the logs.

pub mod error;
mod job;
mod queue;
mod worker;

pub use crate::job::ScanJob;
pub use crate::queue::{Delivery, JobQueue, MemoryQueue, RedisQueue, RedisQueueConfig};
pub use crate::worker::{DEFAULT_CONCURRENCY, Worker, submit_scan};
