use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeedbackOutcome {
    Positive,
    Negative,
    Neutral,
    Hired,
    Rejected,
}

impl FeedbackOutcome {
    /// Relevance grade used by offline evaluation.
    pub fn relevance(&self) -> f64 {
        match self {
            FeedbackOutcome::Hired => 3.0,
            FeedbackOutcome::Positive => 2.0,
            FeedbackOutcome::Neutral => 1.0,
            FeedbackOutcome::Negative | FeedbackOutcome::Rejected => 0.0,
        }
    }
}

tenant_object!(MatchFeedback, "match_feedback", {
    match_id: String,
    outcome: FeedbackOutcome,
    rating: Option<u8>,
    reason: Option<String>,
    metadata: Option<Value>
});

impl MatchFeedback {
    pub fn new(
        tenant: &TenantContext,
        match_id: impl Into<String>,
        outcome: FeedbackOutcome,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            match_id: match_id.into(),
            outcome,
            rating: None,
            reason: None,
            metadata: None,
        }
    }

    pub async fn list_for_match(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        match_id: &str,
    ) -> Result<Vec<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM match_feedback
                 WHERE tenant_id = $tenant AND match_id = $match",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("match", match_id.to_owned()))
            .await?;
        Ok(response.take(0)?)
    }

    /// Per-outcome counts written back onto the match row. BTreeMap keeps the
    /// serialised aggregate key order stable.
    pub fn aggregate(rows: &[Self]) -> Value {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for row in rows {
            let key = match row.outcome {
                FeedbackOutcome::Positive => "Positive",
                FeedbackOutcome::Negative => "Negative",
                FeedbackOutcome::Neutral => "Neutral",
                FeedbackOutcome::Hired => "Hired",
                FeedbackOutcome::Rejected => "Rejected",
            };
            *counts.entry(key.to_string()).or_insert(0) += 1;
        }
        serde_json::json!({
            "total": rows.len(),
            "by_outcome": counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_counts_by_outcome() {
        let tenant = TenantContext::new("acme").expect("tenant");
        let rows = vec![
            MatchFeedback::new(&tenant, "m1", FeedbackOutcome::Positive),
            MatchFeedback::new(&tenant, "m1", FeedbackOutcome::Positive),
            MatchFeedback::new(&tenant, "m1", FeedbackOutcome::Negative),
        ];

        let aggregate = MatchFeedback::aggregate(&rows);
        assert_eq!(aggregate["total"], 3);
        assert_eq!(aggregate["by_outcome"]["Positive"], 2);
        assert_eq!(aggregate["by_outcome"]["Negative"], 1);
    }

    #[test]
    fn relevance_grades_match_expectations() {
        assert_eq!(FeedbackOutcome::Hired.relevance(), 3.0);
        assert_eq!(FeedbackOutcome::Positive.relevance(), 2.0);
        assert_eq!(FeedbackOutcome::Neutral.relevance(), 1.0);
        assert_eq!(FeedbackOutcome::Negative.relevance(), 0.0);
        assert_eq!(FeedbackOutcome::Rejected.relevance(), 0.0);
    }
}
