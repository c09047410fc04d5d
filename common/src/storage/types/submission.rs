use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubmissionStatus {
    Submitted,
    Interview,
    Offer,
    Hired,
    Withdrawn,
    Rejected,
}

impl SubmissionStatus {
    /// Relevance grade used by offline evaluation. Statuses outside the
    /// graded set score zero.
    pub fn relevance(&self) -> f64 {
        match self {
            SubmissionStatus::Submitted => 2.0,
            SubmissionStatus::Interview => 2.5,
            SubmissionStatus::Offer | SubmissionStatus::Hired => 3.0,
            SubmissionStatus::Withdrawn | SubmissionStatus::Rejected => 0.0,
        }
    }
}

tenant_object!(Submission, "submission", {
    match_id: String,
    status: SubmissionStatus
});

impl Submission {
    pub fn new(
        tenant: &TenantContext,
        match_id: impl Into<String>,
        status: SubmissionStatus,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            match_id: match_id.into(),
            status,
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
                "SELECT * FROM submission
                 WHERE tenant_id = $tenant AND match_id = $match",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("match", match_id.to_owned()))
            .await?;
        Ok(response.take(0)?)
    }
}
