//! The background worker pool.

use crate::error::{ErrorKind, Result};
use crate::job::ScanJob;
use crate::queue::{Delivery, JobQueue};
use exn::ResultExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use trove_catalog::{Library, NamePolicy, Repository};
use trove_ingest::reconcile;
use trove_scanner::scan_root;
use uuid::Uuid;

/// Consumers spawned per worker process unless overridden.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// How long each consumer blocks on an empty queue before checking the
/// shutdown flag again.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Submit a scan of a library's root for background execution.
///
/// Returns the job id, the caller's only receipt. There is no status
/// endpoint behind it; completion shows up as catalog rows.
pub async fn submit_scan(queue: &dyn JobQueue, library: &Library) -> Result<Uuid> {
    let job = ScanJob::new(library.id, &library.path);
    queue.enqueue(&job).await?;
    tracing::info!(job = %job.id, library = library.id, "scan job submitted");
    Ok(job.id)
}

/// A pool of queue consumers that turn scan jobs into catalog rows.
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    repo: Repository,
    concurrency: usize,
    shutdown: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(queue: Arc<dyn JobQueue>, repo: Repository) -> Self {
        Self {
            queue,
            repo,
            concurrency: DEFAULT_CONCURRENCY,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Flag shared with the consumer loops; set it to drain and stop.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run consumer loops until the shutdown flag is set.
    pub async fn run(&self) {
        let mut handles = Vec::with_capacity(self.concurrency);
        for index in 0..self.concurrency {
            let queue = self.queue.clone();
            let repo = self.repo.clone();
            let shutdown = self.shutdown.clone();
            let worker_id = format!("{}-{index}", hostname());
            handles.push(tokio::spawn(async move {
                tracing::info!(worker = worker_id, "consumer started");
                while !shutdown.load(Ordering::Relaxed) {
                    match queue.pop(&worker_id, POLL_TIMEOUT).await {
                        Ok(Some(delivery)) => {
                            process(queue.as_ref(), &repo, &delivery).await;
                        },
                        Ok(None) => {},
                        Err(error) => {
                            tracing::error!(worker = worker_id, %error, "queue pop failed");
                            tokio::time::sleep(POLL_TIMEOUT).await;
                        },
                    }
                }
                tracing::info!(worker = worker_id, "consumer stopped");
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Process jobs until the queue stays empty for one poll window.
    /// Returns the number of jobs taken. Single consumer; meant for
    /// one-shot runs and tests.
    pub async fn run_until_idle(&self) -> usize {
        let worker_id = format!("{}-drain", hostname());
        let mut taken = 0;
        loop {
            match self.queue.pop(&worker_id, Duration::from_millis(50)).await {
                Ok(Some(delivery)) => {
                    taken += 1;
                    process(self.queue.as_ref(), &self.repo, &delivery).await;
                },
                Ok(None) => return taken,
                Err(error) => {
                    tracing::error!(%error, "queue pop failed");
                    return taken;
                },
            }
        }
    }
}

/// Run one job and settle it with the queue. Failures are reported via
/// nack; redelivery is safe because reconciliation is idempotent.
async fn process(queue: &dyn JobQueue, repo: &Repository, delivery: &Delivery) {
    let job = &delivery.job;
    tracing::info!(job = %job.id, library = job.library_id, root = %job.root.display(), "scan started");
    match execute(repo, job).await {
        Ok(()) => {
            if let Err(error) = queue.ack(delivery).await {
                tracing::error!(job = %job.id, %error, "ack failed; job may be redelivered");
            }
        },
        Err(error) => {
            tracing::error!(job = %job.id, %error, "scan job failed");
            if let Err(error) = queue.nack(delivery, &error.to_string()).await {
                tracing::error!(job = %job.id, %error, "nack failed");
            }
        },
    }
}

async fn execute(repo: &Repository, job: &ScanJob) -> Result<()> {
    let files = scan_root(&job.root).await.or_raise(|| ErrorKind::Scan)?;
    let summary = reconcile(repo, job.library_id, files, NamePolicy::PreserveExisting).await;
    if summary.skipped.is_empty() {
        tracing::info!(
            job = %job.id,
            files = summary.files_seen,
            models = summary.models_touched,
            upserted = summary.files_upserted,
            "scan finished",
        );
    } else {
        tracing::warn!(
            job = %job.id,
            files = summary.files_seen,
            models = summary.models_touched,
            upserted = summary.files_upserted,
            skipped = summary.skipped.len(),
            "scan finished with skipped files",
        );
    }
    Ok(())
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "trove-worker".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use trove_catalog::Database;

    async fn fixture() -> (Database, Repository) {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        (db, repo)
    }

    async fn seed_tree(root: &std::path::Path) {
        let widget = root.join("widget");
        tokio::fs::create_dir_all(&widget).await.unwrap();
        tokio::fs::write(widget.join("body.stl"), b"solid body").await.unwrap();
        tokio::fs::write(widget.join("lid.obj"), b"o lid").await.unwrap();
        tokio::fs::write(widget.join("notes.txt"), b"ignored").await.unwrap();
    }

    #[tokio::test]
    async fn test_submitted_scan_lands_in_catalog() {
        let (_db, repo) = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        seed_tree(dir.path()).await;
        let library = repo.create_library("prints", dir.path(), "local").await.unwrap();

        let queue = Arc::new(MemoryQueue::new());
        let job_id = submit_scan(queue.as_ref(), &library).await.unwrap();
        assert!(!job_id.is_nil());

        let worker = Worker::new(queue.clone(), repo.clone());
        assert_eq!(worker.run_until_idle().await, 1);
        assert!(queue.is_empty().await);
        assert_eq!(repo.count_models(library.id).await.unwrap(), 1);

        let model = repo
            .get_model_by_path(library.id, &dir.path().join("widget"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(repo.list_model_files(model.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rerunning_the_same_scan_is_idempotent() {
        let (_db, repo) = fixture().await;
        let dir = tempfile::tempdir().unwrap();
        seed_tree(dir.path()).await;
        let library = repo.create_library("prints", dir.path(), "local").await.unwrap();
        let queue = Arc::new(MemoryQueue::new());
        let worker = Worker::new(queue.clone(), repo.clone());

        submit_scan(queue.as_ref(), &library).await.unwrap();
        worker.run_until_idle().await;
        submit_scan(queue.as_ref(), &library).await.unwrap();
        worker.run_until_idle().await;

        assert_eq!(repo.count_models(library.id).await.unwrap(), 1);
        assert_eq!(repo.count_model_files(library.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_missing_root_is_nacked() {
        let (_db, repo) = fixture().await;
        let library = repo.create_library("ghost", "/nonexistent/trove-root", "local").await.unwrap();
        let queue = Arc::new(MemoryQueue::new());
        let worker = Worker::new(queue.clone(), repo.clone());

        submit_scan(queue.as_ref(), &library).await.unwrap();
        assert_eq!(worker.run_until_idle().await, 1);
        assert_eq!(repo.count_models(library.id).await.unwrap(), 0);
    }
}
