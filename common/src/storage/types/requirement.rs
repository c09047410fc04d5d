use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequirementStatus {
    Open,
    InProgress,
    OnHold,
    Closed,
}

tenant_object!(Requirement, "requirement", {
    title: String,
    client_name: String,
    description: String,
    location: Option<String>,
    engagement_type: Option<String>,
    status: RequirementStatus,
    source: String,
    min_rate: Option<f64>,
    max_rate: Option<f64>,
    #[serde(
        serialize_with = "crate::storage::types::serialize_datetime",
        deserialize_with = "crate::storage::types::deserialize_datetime",
        default
    )]
    posted_at: chrono::DateTime<chrono::Utc>,
    #[serde(
        serialize_with = "crate::storage::types::serialize_option_datetime",
        deserialize_with = "crate::storage::types::deserialize_option_datetime",
        default
    )]
    closes_at: Option<chrono::DateTime<chrono::Utc>>
});

impl Requirement {
    pub fn new(
        tenant: &TenantContext,
        title: impl Into<String>,
        client_name: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            title: title.into(),
            client_name: client_name.into(),
            description: description.into(),
            location: None,
            engagement_type: None,
            status: RequirementStatus::Open,
            source: source.into(),
            min_rate: None,
            max_rate: None,
            posted_at: now,
            closes_at: None,
        }
    }

    /// Requirement identity for ingestion: same tenant, title and client
    /// (all compared case-insensitively) refer to the same posting.
    pub async fn find_by_title_client_ci(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        title: &str,
        client_name: &str,
    ) -> Result<Option<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM requirement
                 WHERE tenant_id = $tenant
                   AND string::lowercase(title) = string::lowercase($title)
                   AND string::lowercase(client_name) = string::lowercase($client)
                 LIMIT 1",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("title", title.to_owned()))
            .bind(("client", client_name.to_owned()))
            .await?;
        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().next())
    }
}
