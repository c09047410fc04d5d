use serde_json::json;

use common::audit::{AuditEvent, AuditRecorder};
use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::match_feedback::{FeedbackOutcome, MatchFeedback};
use common::storage::types::match_record::MatchRecord;
use common::storage::TenantContext;

#[derive(Debug, Clone)]
pub struct FeedbackInput {
    pub outcome: FeedbackOutcome,
    pub rating: Option<u8>,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Record one feedback row for a match and atomically refresh the
/// aggregated per-outcome counts on the match itself.
pub async fn submit_feedback(
    db: &SurrealDbClient,
    audit: &AuditRecorder,
    tenant: &TenantContext,
    match_id: &str,
    input: FeedbackInput,
) -> Result<MatchFeedback, AppError> {
    let Some(_record): Option<MatchRecord> = db.get_tenant_item(tenant, match_id).await? else {
        return Err(AppError::NotFound(format!("match {match_id}")));
    };

    let mut feedback = MatchFeedback::new(tenant, match_id, input.outcome);
    feedback.rating = input.rating;
    feedback.reason = input.reason;
    feedback.metadata = input.metadata;

    let stored = db
        .store_tenant_item(tenant, feedback)
        .await?
        .ok_or_else(|| AppError::InternalError("feedback insert returned no row".into()))?;

    let rows = MatchFeedback::list_for_match(db, tenant, match_id).await?;
    let aggregate = MatchFeedback::aggregate(&rows);
    MatchRecord::set_feedback_aggregate(db, tenant, match_id, aggregate).await?;

    audit
        .record(
            tenant,
            AuditEvent::success(
                "match.feedback",
                "match",
                Some(match_id.to_string()),
                json!({"outcome": format!("{:?}", stored.outcome), "total": rows.len()}),
            ),
        )
        .await?;

    Ok(stored)
}
