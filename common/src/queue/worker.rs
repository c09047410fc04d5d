use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::storage::db::SurrealDbClient;
use crate::storage::types::queue_job::QueueJob;

const DEFAULT_LEASE_SECS: u64 = 120;
const IDLE_BACKOFF: Duration = Duration::from_millis(500);

/// A queue consumer. Each job is handled by exactly one invocation at a
/// time; the pool provides the parallelism across jobs.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    fn queue(&self) -> &str;

    async fn handle(&self, job: &QueueJob) -> Result<(), AppError>;
}

/// Per-queue worker pool: `concurrency` claim/process loops over the shared
/// job table. Dropping the pool without calling [`WorkerPool::shutdown`]
/// aborts the loops; shutdown drains in-flight jobs first.
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        db: Arc<SurrealDbClient>,
        handler: Arc<dyn JobHandler>,
        concurrency: usize,
        backoff_base: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let lease = Duration::from_secs(DEFAULT_LEASE_SECS);

        let handles = (0..concurrency.max(1))
            .map(|slot| {
                let db = Arc::clone(&db);
                let handler = Arc::clone(&handler);
                let mut shutdown = shutdown_rx.clone();
                let queue = handler.queue().to_string();
                let worker_id = format!("{queue}-worker-{slot}-{}", Uuid::new_v4());

                tokio::spawn(async move {
                    info!(%worker_id, queue = %queue, "worker started");
                    loop {
                        if *shutdown.borrow() {
                            break;
                        }

                        match QueueJob::claim_next_ready(&db, &queue, &worker_id, Utc::now(), lease)
                            .await
                        {
                            Ok(Some(job)) => {
                                process_one(&db, handler.as_ref(), &worker_id, job, backoff_base)
                                    .await;
                            }
                            Ok(None) => {
                                tokio::select! {
                                    _ = sleep(IDLE_BACKOFF) => {}
                                    _ = shutdown.changed() => {}
                                }
                            }
                            Err(err) => {
                                error!(%worker_id, error = %err, "failed to claim job");
                                tokio::select! {
                                    _ = sleep(Duration::from_secs(1)) => {}
                                    _ = shutdown.changed() => {}
                                }
                            }
                        }
                    }
                    info!(%worker_id, "worker stopped");
                })
            })
            .collect();

        Self {
            shutdown_tx,
            handles,
        }
    }

    /// Signal every loop and wait for in-flight jobs to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "worker task ended abnormally during shutdown");
            }
        }
    }
}

async fn process_one(
    db: &SurrealDbClient,
    handler: &dyn JobHandler,
    worker_id: &str,
    job: QueueJob,
    backoff_base: Duration,
) {
    let job_id = job.id.clone();
    info!(%worker_id, %job_id, attempt = job.attempts, "claimed job");

    match handler.handle(&job).await {
        Ok(()) => {
            if let Err(err) = QueueJob::complete(db, &job_id).await {
                error!(%worker_id, %job_id, error = %err, "failed to mark job complete");
            }
        }
        Err(err) => {
            error!(%worker_id, %job_id, error = %err, "job failed");
            match QueueJob::fail(db, &job, &err.to_string(), backoff_base).await {
                Ok(status) => {
                    info!(%worker_id, %job_id, ?status, "applied retry policy");
                }
                Err(fail_err) => {
                    error!(%worker_id, %job_id, error = %fail_err, "failed to apply retry policy");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::queue_job::{EnqueueOptions, QueueJobStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        queue: String,
        handled: AtomicUsize,
        fail_first: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        fn queue(&self) -> &str {
            &self.queue
        }

        async fn handle(&self, _job: &QueueJob) -> Result<(), AppError> {
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(AppError::Transient("simulated failure".into()));
            }
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn memory_db() -> Arc<SurrealDbClient> {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("worker_ns", &database)
            .await
            .expect("in-memory surrealdb");
        db.ensure_schema().await.expect("schema");
        Arc::new(db)
    }

    #[tokio::test]
    async fn pool_processes_jobs_and_retries_failures() {
        let db = memory_db().await;

        let outcome = QueueJob::enqueue(
            &db,
            "resume.ingestion",
            serde_json::json!({"n": 1}),
            EnqueueOptions::default(),
        )
        .await
        .expect("enqueue");

        let handler = Arc::new(CountingHandler {
            queue: "resume.ingestion".to_string(),
            handled: AtomicUsize::new(0),
            fail_first: AtomicUsize::new(1),
        });

        let pool = WorkerPool::spawn(
            Arc::clone(&db),
            handler.clone(),
            2,
            Duration::from_millis(1),
        );

        // One failure, then the retried attempt succeeds.
        let mut waited = 0;
        while handler.handled.load(Ordering::SeqCst) == 0 && waited < 100 {
            sleep(Duration::from_millis(50)).await;
            waited += 1;
        }
        pool.shutdown().await;

        assert_eq!(handler.handled.load(Ordering::SeqCst), 1);
        let job: Option<QueueJob> = db.get_item(&outcome.job_id).await.expect("get");
        assert_eq!(job.map(|j| j.status), Some(QueueJobStatus::Completed));
    }
}
