use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QueueJobStatus {
    /// Ready (or scheduled) for pickup.
    Waiting,
    /// Leased by a worker.
    Active,
    Completed,
    /// Retries exhausted; parked on the queue's dead-letter side.
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobFailure {
    #[serde(
        serialize_with = "crate::storage::types::serialize_datetime",
        deserialize_with = "crate::storage::types::deserialize_datetime",
        default
    )]
    pub failed_at: DateTime<Utc>,
    pub reason: String,
}

stored_object!(QueueJob, "queue_job", {
    queue: String,
    payload: Value,
    dedupe_key: Option<String>,
    status: QueueJobStatus,
    attempts: u32,
    max_attempts: u32,
    #[serde(
        serialize_with = "crate::storage::types::serialize_option_datetime",
        deserialize_with = "crate::storage::types::deserialize_option_datetime",
        default
    )]
    not_before: Option<DateTime<Utc>>,
    claimed_by: Option<String>,
    #[serde(
        serialize_with = "crate::storage::types::serialize_option_datetime",
        deserialize_with = "crate::storage::types::deserialize_option_datetime",
        default
    )]
    lease_expires_at: Option<DateTime<Utc>>,
    failure: Option<JobFailure>
});

/// Result of an enqueue call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub job_id: String,
    /// An identical live job (same queue + dedupe key) already existed.
    pub deduplicated: bool,
}

#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub dedupe_key: Option<String>,
    pub max_attempts: u32,
    /// Enqueue refuses with a Transient error above this pending depth.
    pub high_water: u64,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            dedupe_key: None,
            max_attempts: 3,
            high_water: 10_000,
        }
    }
}

impl QueueJob {
    pub fn new(queue: impl Into<String>, payload: Value, opts: &EnqueueOptions) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            queue: queue.into(),
            payload,
            dedupe_key: opts.dedupe_key.clone(),
            status: QueueJobStatus::Waiting,
            attempts: 0,
            max_attempts: opts.max_attempts,
            not_before: None,
            claimed_by: None,
            lease_expires_at: None,
            failure: None,
        }
    }

    /// Durable at-least-once enqueue with idempotency-key dedupe and a
    /// backpressure check against the queue's high-water mark.
    pub async fn enqueue(
        db: &SurrealDbClient,
        queue: &str,
        payload: Value,
        opts: EnqueueOptions,
    ) -> Result<EnqueueOutcome, AppError> {
        let pending = Self::pending_count(db, queue).await?;
        if pending >= opts.high_water {
            return Err(AppError::Transient(format!(
                "queue {queue} is above its high-water mark ({pending} pending)"
            )));
        }

        if let Some(dedupe_key) = &opts.dedupe_key {
            let mut response = db
                .client
                .query(
                    "SELECT * FROM queue_job
                     WHERE queue = $queue AND dedupe_key = $key
                       AND status IN [$waiting, $active]
                     LIMIT 1",
                )
                .bind(("queue", queue.to_owned()))
                .bind(("key", dedupe_key.clone()))
                .bind(("waiting", QueueJobStatus::Waiting))
                .bind(("active", QueueJobStatus::Active))
                .await?;
            let live: Vec<Self> = response.take(0)?;
            if let Some(existing) = live.into_iter().next() {
                return Ok(EnqueueOutcome {
                    job_id: existing.id,
                    deduplicated: true,
                });
            }
        }

        let job = Self::new(queue, payload, &opts);
        let job_id = job.id.clone();
        db.store_item(job).await?;
        Ok(EnqueueOutcome {
            job_id,
            deduplicated: false,
        })
    }

    /// Atomically claim the oldest ready job: a `Waiting` job whose
    /// `not_before` has passed, or an `Active` job whose lease expired.
    /// The claim bumps the attempt counter.
    pub async fn claim_next_ready(
        db: &SurrealDbClient,
        queue: &str,
        worker_id: &str,
        now: DateTime<Utc>,
        lease: std::time::Duration,
    ) -> Result<Option<Self>, AppError> {
        let lease_expires = now
            + ChronoDuration::from_std(lease)
                .map_err(|e| AppError::InternalError(format!("invalid lease duration: {e}")))?;

        let mut response = db
            .client
            .query(
                "BEGIN TRANSACTION;
                 LET $candidate = (SELECT VALUE id FROM queue_job
                     WHERE queue = $queue AND (
                         (status = $waiting AND (not_before = NONE OR not_before <= $now))
                         OR (status = $active AND lease_expires_at != NONE AND lease_expires_at < $now)
                     )
                     ORDER BY created_at ASC
                     LIMIT 1);
                 UPDATE $candidate SET
                     status = $active,
                     claimed_by = $worker,
                     lease_expires_at = $lease_expires,
                     attempts += 1,
                     updated_at = time::now()
                 RETURN AFTER;
                 COMMIT TRANSACTION;",
            )
            .bind(("queue", queue.to_owned()))
            .bind(("waiting", QueueJobStatus::Waiting))
            .bind(("active", QueueJobStatus::Active))
            .bind(("now", surrealdb::sql::Datetime::from(now)))
            .bind(("worker", worker_id.to_owned()))
            .bind(("lease_expires", surrealdb::sql::Datetime::from(lease_expires)))
            .await?;
        let claimed: Vec<Self> = response.take(1)?;
        Ok(claimed.into_iter().next())
    }

    pub async fn complete(db: &SurrealDbClient, job_id: &str) -> Result<(), AppError> {
        db.client
            .query(
                "UPDATE type::thing('queue_job', $id) SET
                     status = $status,
                     claimed_by = NONE,
                     lease_expires_at = NONE,
                     updated_at = time::now()",
            )
            .bind(("id", job_id.to_owned()))
            .bind(("status", QueueJobStatus::Completed))
            .await?
            .check()?;
        Ok(())
    }

    /// Apply the retry policy after a failed run: schedule the next attempt
    /// at `now + base · 2^(attempt−1)`, or park the job on the dead-letter
    /// side once attempts are exhausted.
    pub async fn fail(
        db: &SurrealDbClient,
        job: &Self,
        reason: &str,
        backoff_base: std::time::Duration,
    ) -> Result<QueueJobStatus, AppError> {
        let now = Utc::now();
        let failure = JobFailure {
            failed_at: now,
            reason: reason.to_string(),
        };

        if job.attempts >= job.max_attempts {
            db.client
                .query(
                    "UPDATE type::thing('queue_job', $id) SET
                         status = $status,
                         claimed_by = NONE,
                         lease_expires_at = NONE,
                         failure = $failure,
                         updated_at = time::now()",
                )
                .bind(("id", job.id.clone()))
                .bind(("status", QueueJobStatus::Dead))
                .bind(("failure", failure))
                .await?
                .check()?;
            return Ok(QueueJobStatus::Dead);
        }

        let exponent = job.attempts.saturating_sub(1).min(16);
        let delay_ms = backoff_base.as_millis() as u64 * (1u64 << exponent);
        let not_before = now + ChronoDuration::milliseconds(delay_ms as i64);

        db.client
            .query(
                "UPDATE type::thing('queue_job', $id) SET
                     status = $status,
                     claimed_by = NONE,
                     lease_expires_at = NONE,
                     not_before = $not_before,
                     failure = $failure,
                     updated_at = time::now()",
            )
            .bind(("id", job.id.clone()))
            .bind(("status", QueueJobStatus::Waiting))
            .bind(("not_before", surrealdb::sql::Datetime::from(not_before)))
            .bind(("failure", failure))
            .await?
            .check()?;
        Ok(QueueJobStatus::Waiting)
    }

    async fn count_by_status(
        db: &SurrealDbClient,
        queue: &str,
        statuses: Vec<QueueJobStatus>,
    ) -> Result<u64, AppError> {
        #[derive(Deserialize)]
        struct CountRow {
            count: u64,
        }

        let mut response = db
            .client
            .query(
                "SELECT count() AS count FROM queue_job
                 WHERE queue = $queue AND status IN $statuses
                 GROUP ALL",
            )
            .bind(("queue", queue.to_owned()))
            .bind(("statuses", statuses))
            .await?;
        let rows: Vec<CountRow> = response.take(0)?;
        Ok(rows.first().map_or(0, |r| r.count))
    }

    /// Waiting + Active depth, the backpressure signal.
    pub async fn pending_count(db: &SurrealDbClient, queue: &str) -> Result<u64, AppError> {
        Self::count_by_status(
            db,
            queue,
            vec![QueueJobStatus::Waiting, QueueJobStatus::Active],
        )
        .await
    }

    pub async fn dead_count(db: &SurrealDbClient, queue: &str) -> Result<u64, AppError> {
        Self::count_by_status(db, queue, vec![QueueJobStatus::Dead]).await
    }

    /// Requeue up to `limit` dead jobs with a fresh attempt counter.
    pub async fn drain_dead(
        db: &SurrealDbClient,
        queue: &str,
        limit: u64,
    ) -> Result<u64, AppError> {
        let mut response = db
            .client
            .query(
                "BEGIN TRANSACTION;
                 LET $dead = (SELECT VALUE id FROM queue_job
                     WHERE queue = $queue AND status = $dead_status
                     ORDER BY created_at ASC
                     LIMIT $limit);
                 UPDATE $dead SET
                     status = $waiting,
                     attempts = 0,
                     not_before = NONE,
                     failure = NONE,
                     updated_at = time::now()
                 RETURN AFTER;
                 COMMIT TRANSACTION;",
            )
            .bind(("queue", queue.to_owned()))
            .bind(("dead_status", QueueJobStatus::Dead))
            .bind(("waiting", QueueJobStatus::Waiting))
            .bind(("limit", limit as i64))
            .await?;
        let revived: Vec<Self> = response.take(1)?;
        Ok(revived.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn memory_db() -> SurrealDbClient {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("queue_ns", &database)
            .await
            .expect("in-memory surrealdb");
        db.ensure_schema().await.expect("schema");
        db
    }

    #[tokio::test]
    async fn enqueue_claim_complete_round_trip() {
        let db = memory_db().await;

        let outcome = QueueJob::enqueue(
            &db,
            "resume.ingestion",
            serde_json::json!({"document_id": "d1"}),
            EnqueueOptions::default(),
        )
        .await
        .expect("enqueue");
        assert!(!outcome.deduplicated);

        let claimed = QueueJob::claim_next_ready(
            &db,
            "resume.ingestion",
            "worker-1",
            Utc::now(),
            Duration::from_secs(30),
        )
        .await
        .expect("claim")
        .expect("job available");
        assert_eq!(claimed.id, outcome.job_id);
        assert_eq!(claimed.status, QueueJobStatus::Active);
        assert_eq!(claimed.attempts, 1);

        // The leased job is invisible to other workers.
        let second = QueueJob::claim_next_ready(
            &db,
            "resume.ingestion",
            "worker-2",
            Utc::now(),
            Duration::from_secs(30),
        )
        .await
        .expect("claim");
        assert!(second.is_none());

        QueueJob::complete(&db, &claimed.id).await.expect("complete");
        assert_eq!(
            QueueJob::pending_count(&db, "resume.ingestion")
                .await
                .expect("count"),
            0
        );
    }

    #[tokio::test]
    async fn dedupe_key_prevents_double_enqueue() {
        let db = memory_db().await;

        let opts = EnqueueOptions {
            dedupe_key: Some("sha256:abc".to_string()),
            ..EnqueueOptions::default()
        };
        let first = QueueJob::enqueue(&db, "resume.ingestion", serde_json::json!({}), opts.clone())
            .await
            .expect("enqueue");
        let second = QueueJob::enqueue(&db, "resume.ingestion", serde_json::json!({}), opts)
            .await
            .expect("enqueue");

        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(first.job_id, second.job_id);
        assert_eq!(
            QueueJob::pending_count(&db, "resume.ingestion")
                .await
                .expect("count"),
            1
        );
    }

    #[tokio::test]
    async fn exhausted_retries_land_in_dlq_exactly_once() {
        let db = memory_db().await;

        let opts = EnqueueOptions {
            max_attempts: 2,
            ..EnqueueOptions::default()
        };
        QueueJob::enqueue(&db, "requirement.ingestion", serde_json::json!({}), opts)
            .await
            .expect("enqueue");

        // First attempt fails and reschedules.
        let job = QueueJob::claim_next_ready(
            &db,
            "requirement.ingestion",
            "w",
            Utc::now(),
            Duration::from_secs(5),
        )
        .await
        .expect("claim")
        .expect("job");
        let status = QueueJob::fail(&db, &job, "boom", Duration::from_millis(1))
            .await
            .expect("fail");
        assert_eq!(status, QueueJobStatus::Waiting);

        // Allow the backoff window to pass, then fail the final attempt.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let job = QueueJob::claim_next_ready(
            &db,
            "requirement.ingestion",
            "w",
            Utc::now(),
            Duration::from_secs(5),
        )
        .await
        .expect("claim")
        .expect("job");
        assert_eq!(job.attempts, 2);
        let status = QueueJob::fail(&db, &job, "boom again", Duration::from_millis(1))
            .await
            .expect("fail");
        assert_eq!(status, QueueJobStatus::Dead);

        // Exactly once in the DLQ, gone from the primary.
        assert_eq!(
            QueueJob::dead_count(&db, "requirement.ingestion")
                .await
                .expect("dead"),
            1
        );
        assert_eq!(
            QueueJob::pending_count(&db, "requirement.ingestion")
                .await
                .expect("pending"),
            0
        );
        let none = QueueJob::claim_next_ready(
            &db,
            "requirement.ingestion",
            "w",
            Utc::now(),
            Duration::from_secs(5),
        )
        .await
        .expect("claim");
        assert!(none.is_none());

        // The dead job retains the failure context.
        let dead: Option<QueueJob> = db.get_item(&job.id).await.expect("get");
        let dead = dead.expect("dead job present");
        assert_eq!(dead.failure.as_ref().map(|f| f.reason.as_str()), Some("boom again"));
    }

    #[tokio::test]
    async fn drain_requeues_dead_jobs_with_fresh_attempts() {
        let db = memory_db().await;

        let opts = EnqueueOptions {
            max_attempts: 1,
            ..EnqueueOptions::default()
        };
        QueueJob::enqueue(&db, "sync.processing", serde_json::json!({}), opts)
            .await
            .expect("enqueue");

        let job = QueueJob::claim_next_ready(
            &db,
            "sync.processing",
            "w",
            Utc::now(),
            Duration::from_secs(5),
        )
        .await
        .expect("claim")
        .expect("job");
        QueueJob::fail(&db, &job, "dead on first", Duration::from_millis(1))
            .await
            .expect("fail");
        assert_eq!(QueueJob::dead_count(&db, "sync.processing").await.expect("dead"), 1);

        let drained = QueueJob::drain_dead(&db, "sync.processing", 10)
            .await
            .expect("drain");
        assert_eq!(drained, 1);
        assert_eq!(QueueJob::dead_count(&db, "sync.processing").await.expect("dead"), 0);

        let revived = QueueJob::claim_next_ready(
            &db,
            "sync.processing",
            "w",
            Utc::now(),
            Duration::from_secs(5),
        )
        .await
        .expect("claim")
        .expect("revived job");
        assert_eq!(revived.attempts, 1);
    }

    #[tokio::test]
    async fn expired_leases_are_reclaimed() {
        let db = memory_db().await;

        QueueJob::enqueue(
            &db,
            "webhook.processing",
            serde_json::json!({}),
            EnqueueOptions::default(),
        )
        .await
        .expect("enqueue");

        let first = QueueJob::claim_next_ready(
            &db,
            "webhook.processing",
            "w1",
            Utc::now(),
            Duration::from_millis(5),
        )
        .await
        .expect("claim")
        .expect("job");

        tokio::time::sleep(Duration::from_millis(20)).await;

        let reclaimed = QueueJob::claim_next_ready(
            &db,
            "webhook.processing",
            "w2",
            Utc::now(),
            Duration::from_secs(30),
        )
        .await
        .expect("claim")
        .expect("reclaimed job");
        assert_eq!(reclaimed.id, first.id);
        assert_eq!(reclaimed.claimed_by.as_deref(), Some("w2"));
        assert_eq!(reclaimed.attempts, 2);
    }

    #[tokio::test]
    async fn backpressure_rejects_above_high_water() {
        let db = memory_db().await;

        let opts = EnqueueOptions {
            high_water: 1,
            ..EnqueueOptions::default()
        };
        QueueJob::enqueue(&db, "resume.ingestion", serde_json::json!({}), opts.clone())
            .await
            .expect("first enqueue");
        let err = QueueJob::enqueue(&db, "resume.ingestion", serde_json::json!({}), opts)
            .await
            .expect_err("second enqueue must hit the high-water mark");
        assert!(matches!(err, AppError::Transient(_)));
    }
}
