use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IngestionStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PiiStatus {
    Unknown,
    Clean,
    Flagged,
}

tenant_object!(DocumentMetadata, "document_metadata", {
    document_id: String,
    sha256: String,
    sha1: String,
    md5: String,
    ingestion_status: IngestionStatus,
    pii_status: PiiStatus,
    pii_summary: Value,
    page_count: Option<u32>,
    text_byte_size: Option<u64>,
    ingestion_latency_ms: Option<u64>,
    #[serde(
        serialize_with = "crate::storage::types::serialize_option_datetime",
        deserialize_with = "crate::storage::types::deserialize_option_datetime",
        default
    )]
    extracted_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(
        serialize_with = "crate::storage::types::serialize_option_datetime",
        deserialize_with = "crate::storage::types::deserialize_option_datetime",
        default
    )]
    last_redaction_at: Option<chrono::DateTime<chrono::Utc>>
});

impl DocumentMetadata {
    pub fn new(
        tenant: &TenantContext,
        document_id: impl Into<String>,
        sha256: impl Into<String>,
        sha1: impl Into<String>,
        md5: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            document_id: document_id.into(),
            sha256: sha256.into(),
            sha1: sha1.into(),
            md5: md5.into(),
            ingestion_status: IngestionStatus::Pending,
            pii_status: PiiStatus::Unknown,
            pii_summary: Value::Null,
            page_count: None,
            text_byte_size: None,
            ingestion_latency_ms: None,
            extracted_at: None,
            last_redaction_at: None,
        }
    }

    /// Dedupe lookup: `(tenant, sha256)` identifies a document.
    pub async fn find_by_sha256(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        sha256: &str,
    ) -> Result<Option<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM document_metadata
                 WHERE tenant_id = $tenant AND sha256 = $sha256
                 LIMIT 1",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("sha256", sha256.to_owned()))
            .await?;
        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    pub async fn find_by_document_id(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        document_id: &str,
    ) -> Result<Option<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM document_metadata
                 WHERE tenant_id = $tenant AND document_id = $document
                 LIMIT 1",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("document", document_id.to_owned()))
            .await?;
        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    pub async fn set_status(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        document_id: &str,
        status: IngestionStatus,
    ) -> Result<(), AppError> {
        db.client
            .query(
                "UPDATE document_metadata
                 SET ingestion_status = $status, updated_at = time::now()
                 WHERE tenant_id = $tenant AND document_id = $document",
            )
            .bind(("status", status))
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("document", document_id.to_owned()))
            .await?
            .check()?;
        Ok(())
    }

    /// Final worker bookkeeping after a successful run.
    #[allow(clippy::too_many_arguments)]
    pub async fn complete_ingestion(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        document_id: &str,
        pii_status: PiiStatus,
        pii_summary: Value,
        text_byte_size: u64,
        page_count: Option<u32>,
        ingestion_latency_ms: u64,
    ) -> Result<(), AppError> {
        db.client
            .query(
                "UPDATE document_metadata SET
                     ingestion_status = $status,
                     pii_status = $pii_status,
                     pii_summary = $pii_summary,
                     text_byte_size = $text_byte_size,
                     page_count = $page_count,
                     ingestion_latency_ms = $latency,
                     extracted_at = time::now(),
                     last_redaction_at = time::now(),
                     updated_at = time::now()
                 WHERE tenant_id = $tenant AND document_id = $document",
            )
            .bind(("status", IngestionStatus::Complete))
            .bind(("pii_status", pii_status))
            .bind(("pii_summary", pii_summary))
            .bind(("text_byte_size", text_byte_size))
            .bind(("page_count", page_count))
            .bind(("latency", ingestion_latency_ms))
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("document", document_id.to_owned()))
            .await?
            .check()?;
        Ok(())
    }
}
