use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

tenant_object!(MatchFeatureSnapshot, "match_feature_snapshot", {
    match_id: String,
    model_version: String,
    features: Value,
    explanation: Value
});

impl MatchFeatureSnapshot {
    /// Snapshots are immutable history; one is appended per scoring run.
    pub fn new(
        tenant: &TenantContext,
        match_id: impl Into<String>,
        model_version: impl Into<String>,
        features: Value,
        explanation: Value,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            match_id: match_id.into(),
            model_version: model_version.into(),
            features,
            explanation,
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
                "SELECT * FROM match_feature_snapshot
                 WHERE tenant_id = $tenant AND match_id = $match
                 ORDER BY created_at ASC",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("match", match_id.to_owned()))
            .await?;
        Ok(response.take(0)?)
    }
}
