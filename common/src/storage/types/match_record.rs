use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{sleep, Duration};
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

use super::match_feature_snapshot::MatchFeatureSnapshot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MatchStatus {
    Review,
    Shortlisted,
    Submitted,
    Rejected,
    Hired,
}

impl MatchStatus {
    /// Relevance grade used by offline evaluation.
    pub fn relevance(&self) -> f64 {
        match self {
            MatchStatus::Shortlisted | MatchStatus::Submitted => 2.0,
            MatchStatus::Hired => 3.0,
            MatchStatus::Review | MatchStatus::Rejected => 0.0,
        }
    }
}

tenant_object!(MatchRecord, "match_record", {
    consultant_id: String,
    requirement_id: String,
    score: f64,
    status: MatchStatus,
    explanation: Value,
    feedback: Value
});

impl MatchRecord {
    pub fn new(
        tenant: &TenantContext,
        consultant_id: impl Into<String>,
        requirement_id: impl Into<String>,
        score: f64,
        explanation: Value,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            consultant_id: consultant_id.into(),
            requirement_id: requirement_id.into(),
            score,
            status: MatchStatus::Review,
            explanation,
            feedback: Value::Null,
        }
    }

    pub async fn find_pair(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        consultant_id: &str,
        requirement_id: &str,
    ) -> Result<Option<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM match_record
                 WHERE tenant_id = $tenant
                   AND consultant_id = $consultant
                   AND requirement_id = $requirement
                 LIMIT 1",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("consultant", consultant_id.to_owned()))
            .bind(("requirement", requirement_id.to_owned()))
            .await?;
        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    pub async fn list_for_requirement(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        requirement_id: &str,
    ) -> Result<Vec<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM match_record
                 WHERE tenant_id = $tenant AND requirement_id = $requirement
                 ORDER BY score DESC",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("requirement", requirement_id.to_owned()))
            .await?;
        Ok(response.take(0)?)
    }

    /// Upsert the `(tenant, consultant, requirement)` match and append one
    /// immutable feature snapshot, inside a single transaction. Retried on
    /// transient write conflicts; the unique pair index keeps concurrent
    /// runs from forking the row.
    pub async fn upsert_with_snapshot(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        record: Self,
        snapshot: MatchFeatureSnapshot,
    ) -> Result<Self, AppError> {
        const MAX_ATTEMPTS: usize = 3;
        const INITIAL_BACKOFF_MS: u64 = 50;
        const MAX_BACKOFF_MS: u64 = 800;

        let mut backoff_ms = INITIAL_BACKOFF_MS;

        for attempt in 0..MAX_ATTEMPTS {
            let existing =
                Self::find_pair(db, tenant, &record.consultant_id, &record.requirement_id).await?;

            let mut row = record.clone();
            if let Some(current) = &existing {
                row.id = current.id.clone();
                row.created_at = current.created_at;
                row.status = current.status;
                row.feedback = current.feedback.clone();
            }
            let mut linked_snapshot = snapshot.clone();
            linked_snapshot.match_id = row.id.clone();

            let result = db
                .client
                .query(
                    "BEGIN TRANSACTION;
                     UPSERT type::thing('match_record', $match_id) CONTENT $match;
                     CREATE type::thing('match_feature_snapshot', $snapshot_id) CONTENT $snapshot;
                     COMMIT TRANSACTION;",
                )
                .bind(("match_id", row.id.clone()))
                .bind(("match", row.clone()))
                .bind(("snapshot_id", linked_snapshot.id.clone()))
                .bind(("snapshot", linked_snapshot))
                .await;

            match result.and_then(|r| r.check()) {
                Ok(_) => return Ok(row),
                Err(err) => {
                    if is_retryable_conflict(&err) && attempt + 1 < MAX_ATTEMPTS {
                        warn!(
                            attempt = attempt + 1,
                            "Transient conflict while persisting match; retrying"
                        );
                        sleep(Duration::from_millis(backoff_ms)).await;
                        backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
                        continue;
                    }
                    return Err(AppError::from(err));
                }
            }
        }

        Err(AppError::InternalError(
            "failed to persist match after retries".to_string(),
        ))
    }

    pub async fn set_feedback_aggregate(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        match_id: &str,
        aggregate: Value,
    ) -> Result<(), AppError> {
        db.client
            .query(
                "UPDATE type::thing('match_record', $id)
                 SET feedback = $feedback, updated_at = time::now()
                 WHERE tenant_id = $tenant",
            )
            .bind(("id", match_id.to_owned()))
            .bind(("feedback", aggregate))
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .await?
            .check()?;
        Ok(())
    }
}

fn is_retryable_conflict(error: &surrealdb::Error) -> bool {
    error
        .to_string()
        .contains("Failed to commit transaction due to a read or write conflict")
}
