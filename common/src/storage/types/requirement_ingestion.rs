use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequirementIngestionStatus {
    Pending,
    Processed,
    Failed,
}

tenant_object!(RequirementIngestion, "requirement_ingestion", {
    source: String,
    raw_content: String,
    content_hash: String,
    parsed_data: Value,
    status: RequirementIngestionStatus,
    retry_count: u32,
    #[serde(
        serialize_with = "crate::storage::types::serialize_option_datetime",
        deserialize_with = "crate::storage::types::deserialize_option_datetime",
        default
    )]
    processed_at: Option<chrono::DateTime<chrono::Utc>>,
    latency_ms: Option<u64>
});

impl RequirementIngestion {
    pub fn new(
        tenant: &TenantContext,
        source: impl Into<String>,
        raw_content: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            source: source.into(),
            raw_content: raw_content.into(),
            content_hash: content_hash.into(),
            parsed_data: Value::Null,
            status: RequirementIngestionStatus::Pending,
            retry_count: 0,
            processed_at: None,
            latency_ms: None,
        }
    }

    /// Ingestion dedupe key: `(tenant, content_hash)`.
    pub async fn find_by_hash(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        content_hash: &str,
    ) -> Result<Option<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM requirement_ingestion
                 WHERE tenant_id = $tenant AND content_hash = $hash
                 LIMIT 1",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("hash", content_hash.to_owned()))
            .await?;
        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    pub async fn mark_processed(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        id: &str,
        parsed_data: Value,
        latency_ms: u64,
    ) -> Result<(), AppError> {
        db.client
            .query(
                "UPDATE type::thing('requirement_ingestion', $id) SET
                     status = $status,
                     parsed_data = $parsed,
                     processed_at = time::now(),
                     latency_ms = $latency,
                     updated_at = time::now()
                 WHERE tenant_id = $tenant",
            )
            .bind(("id", id.to_owned()))
            .bind(("status", RequirementIngestionStatus::Processed))
            .bind(("parsed", parsed_data))
            .bind(("latency", latency_ms))
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .await?
            .check()?;
        Ok(())
    }

    pub async fn mark_failed(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        id: &str,
    ) -> Result<(), AppError> {
        db.client
            .query(
                "UPDATE type::thing('requirement_ingestion', $id) SET
                     status = $status,
                     retry_count += 1,
                     updated_at = time::now()
                 WHERE tenant_id = $tenant",
            )
            .bind(("id", id.to_owned()))
            .bind(("status", RequirementIngestionStatus::Failed))
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .await?
            .check()?;
        Ok(())
    }
}
