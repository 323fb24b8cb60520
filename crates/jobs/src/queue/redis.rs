//! Redis Streams queue implementation.
//!
//! Jobs are XADDed to a single stream and consumed through a consumer
//! group, which gives at-least-once delivery: a worker that dies after
//! popping leaves its message in the pending entries list, and another
//! worker reclaims it via XAUTOCLAIM once it has sat idle long enough.

use crate::error::{ErrorKind, Result};
use crate::job::ScanJob;
use crate::queue::{Delivery, JobQueue};
use exn::ResultExt;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, RedisResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Stream carrying scan jobs.
const QUEUE_KEY: &str = "trove:scan:queue";
/// Consumer group shared by all workers.
const CONSUMER_GROUP: &str = "trove-workers";
/// Field name holding the serialized job inside each stream entry.
const PAYLOAD_FIELD: &str = "payload";

/// Configuration for the Redis-backed queue.
#[derive(Debug, Clone)]
pub struct RedisQueueConfig {
    /// Redis connection URL.
    pub url: String,
    /// How long a popped message may sit unacknowledged before another
    /// worker is allowed to claim it.
    pub claim_timeout: Duration,
}

impl Default for RedisQueueConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            claim_timeout: Duration::from_secs(120),
        }
    }
}

impl RedisQueueConfig {
    pub fn with_url(url: &str) -> Self {
        Self { url: url.to_string(), ..Default::default() }
    }
}

/// Durable queue backed by a Redis stream and consumer group.
pub struct RedisQueue {
    connection: Arc<RwLock<MultiplexedConnection>>,
    config: RedisQueueConfig,
}

impl RedisQueue {
    pub async fn new(config: RedisQueueConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).or_raise(|| ErrorKind::Queue)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .or_raise(|| ErrorKind::Queue)?;
        let queue = Self { connection: Arc::new(RwLock::new(connection)), config };
        queue.init_consumer_group().await?;
        Ok(queue)
    }

    /// Create the stream and consumer group if they do not exist yet.
    /// Safe to call from every worker at startup.
    async fn init_consumer_group(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(QUEUE_KEY)
            .arg(CONSUMER_GROUP)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut *conn)
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.to_string().contains("BUSYGROUP") => Ok(()),
            Err(err) => Err(err).or_raise(|| ErrorKind::Queue),
        }
    }

    /// Take over a message abandoned by a dead or stuck worker.
    async fn claim_abandoned(&self, worker_id: &str) -> Result<Option<Delivery>> {
        let mut conn = self.connection.write().await;
        let idle_ms = self.config.claim_timeout.as_millis() as u64;

        let result: RedisResult<(String, Vec<(String, Vec<(String, String)>)>)> =
            redis::cmd("XAUTOCLAIM")
                .arg(QUEUE_KEY)
                .arg(CONSUMER_GROUP)
                .arg(worker_id)
                .arg(idle_ms)
                .arg("0-0")
                .arg("COUNT")
                .arg(1)
                .query_async(&mut *conn)
                .await;

        let (_, messages) = match result {
            Ok(reply) => reply,
            Err(err) if err.to_string().contains("NOGROUP") => return Ok(None),
            Err(err) => return Err(err).or_raise(|| ErrorKind::Queue),
        };

        for (receipt, fields) in messages {
            if let Some((_, payload)) = fields.into_iter().find(|(name, _)| name == PAYLOAD_FIELD) {
                let job = ScanJob::from_json(&payload)?;
                tracing::info!(job = %job.id, %receipt, "reclaimed abandoned job");
                return Ok(Some(Delivery { job, receipt }));
            }
        }
        Ok(None)
    }
}

#[async_trait::async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, job: &ScanJob) -> Result<()> {
        let payload = job.to_json()?;
        let mut conn = self.connection.write().await;
        redis::cmd("XADD")
            .arg(QUEUE_KEY)
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(&payload)
            .query_async::<String>(&mut *conn)
            .await
            .or_raise(|| ErrorKind::Queue)?;
        tracing::debug!(job = %job.id, library = job.library_id, "enqueued scan job");
        Ok(())
    }

    async fn pop(&self, worker_id: &str, timeout: Duration) -> Result<Option<Delivery>> {
        if let Some(delivery) = self.claim_abandoned(worker_id).await? {
            return Ok(Some(delivery));
        }

        let mut conn = self.connection.write().await;
        let opts = StreamReadOptions::default()
            .group(CONSUMER_GROUP, worker_id)
            .count(1)
            .block(timeout.as_millis() as usize);

        let reply: StreamReadReply = conn
            .xread_options(&[QUEUE_KEY], &[">"], &opts)
            .await
            .or_raise(|| ErrorKind::Queue)?;

        for stream in reply.keys {
            for msg in stream.ids {
                let Some(value) = msg.map.get(PAYLOAD_FIELD) else {
                    continue;
                };
                let payload: String = redis::FromRedisValue::from_redis_value(value)
                    .or_raise(|| ErrorKind::Serialization)?;
                let job = ScanJob::from_json(&payload)?;
                return Ok(Some(Delivery { job, receipt: msg.id }));
            }
        }
        Ok(None)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        let mut conn = self.connection.write().await;
        conn.xack::<_, _, _, i64>(QUEUE_KEY, CONSUMER_GROUP, &[&delivery.receipt])
            .await
            .or_raise(|| ErrorKind::Queue)?;
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, reason: &str) -> Result<()> {
        // Left in the pending entries list on purpose; XAUTOCLAIM hands
        // it to another worker after the claim timeout.
        tracing::warn!(job = %delivery.job.id, reason, "job failed; awaiting redelivery");
        Ok(())
    }
}
