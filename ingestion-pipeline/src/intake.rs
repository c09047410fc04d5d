use std::sync::Arc;

use bytes::Bytes;
use serde_json::json;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::info;

use common::audit::{AuditEvent, AuditRecorder};
use common::error::AppError;
use common::queue::{REQUIREMENT_INGESTION, RESUME_INGESTION};
use common::resilience::{CircuitBreakerConfig, CircuitBreakerRegistry};
use common::storage::db::SurrealDbClient;
use common::storage::store::StorageManager;
use common::storage::types::document_asset::{DocumentAsset, DocumentKind};
use common::storage::types::document_metadata::DocumentMetadata;
use common::storage::types::queue_job::{EnqueueOptions, QueueJob};
use common::storage::types::requirement_ingestion::RequirementIngestion;
use common::storage::TenantContext;
use common::utils::config::AppConfig;

use crate::pipeline::{RequirementJobPayload, ResumeJobPayload};

/// Entry point for both ingestion paths: hashing, dedupe, blob persistence
/// and enqueueing. Workers pick the jobs up from there.
pub struct IngestionService {
    db: Arc<SurrealDbClient>,
    storage: StorageManager,
    audit: Arc<AuditRecorder>,
    breakers: Arc<CircuitBreakerRegistry>,
    config: AppConfig,
}

#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
    pub source: String,
    pub consultant_id: Option<String>,
    pub requirement_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeIntakeOutcome {
    pub document_id: String,
    pub duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementIntakeOutcome {
    pub ingestion_id: String,
    pub duplicate: bool,
}

impl IngestionService {
    pub fn new(
        db: Arc<SurrealDbClient>,
        storage: StorageManager,
        audit: Arc<AuditRecorder>,
        breakers: Arc<CircuitBreakerRegistry>,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            storage,
            audit,
            breakers,
            config,
        }
    }

    pub fn db(&self) -> &Arc<SurrealDbClient> {
        &self.db
    }

    /// Resume intake: hash, dedupe on `(tenant, sha256)`, persist bytes,
    /// create the document rows and enqueue the worker job. A re-upload of
    /// identical bytes returns the existing document id without enqueueing.
    pub async fn ingest_resume(
        &self,
        tenant: &TenantContext,
        upload: ResumeUpload,
    ) -> Result<ResumeIntakeOutcome, AppError> {
        let sha256 = hex_digest::<Sha256>(&upload.bytes);
        let sha1 = hex_digest::<Sha1>(&upload.bytes);
        let md5 = format!("{:x}", md5::compute(&upload.bytes));

        if let Some(existing) = DocumentMetadata::find_by_sha256(&self.db, tenant, &sha256).await? {
            info!(
                tenant = tenant.tenant_id(),
                document_id = %existing.document_id,
                "duplicate resume upload short-circuited"
            );
            return Ok(ResumeIntakeOutcome {
                document_id: existing.document_id,
                duplicate: true,
            });
        }

        let document_id = DocumentAsset::fresh_id();
        let storage_key = format!(
            "tenants/{}/documents/{}/{}",
            tenant.tenant_id(),
            document_id,
            sanitize_file_name(&upload.file_name)
        );

        // Blob writes go through the file-storage breaker; transient
        // backend failures trip it before they cascade.
        let breaker = self
            .breakers
            .get_or_create_with_config("file_storage", CircuitBreakerConfig::file_storage());
        let bytes = upload.bytes.clone();
        let storage = self.storage.clone();
        let key = storage_key.clone();
        breaker
            .call(move || async move { storage.put(&key, bytes).await })
            .await?;

        let mut asset = DocumentAsset::new(
            tenant,
            document_id.clone(),
            DocumentKind::Resume,
            upload.file_name.clone(),
            upload.content_type.clone(),
            upload.bytes.len() as u64,
            storage_key.clone(),
        );
        asset.consultant_id = upload.consultant_id.clone();
        asset.requirement_id = upload.requirement_id.clone();
        self.db.store_tenant_item(tenant, asset).await?;

        let metadata = DocumentMetadata::new(tenant, document_id.clone(), &sha256, &sha1, &md5);
        self.db.store_tenant_item(tenant, metadata).await?;

        let payload = ResumeJobPayload {
            tenant_id: tenant.tenant_id().to_string(),
            document_id: document_id.clone(),
            storage_key,
            content_type: upload.content_type,
            source: upload.source,
            consultant_id: upload.consultant_id,
            requirement_id: upload.requirement_id,
        };
        QueueJob::enqueue(
            &self.db,
            RESUME_INGESTION,
            serde_json::to_value(&payload)
                .map_err(|e| AppError::InternalError(format!("payload serialisation: {e}")))?,
            EnqueueOptions {
                dedupe_key: Some(sha256.clone()),
                max_attempts: self.config.queue_max_attempts,
                high_water: self.config.queue_high_water,
            },
        )
        .await?;

        self.audit
            .record(
                tenant,
                AuditEvent::success(
                    "resume.received",
                    "document",
                    Some(document_id.clone()),
                    json!({"sha256": sha256, "file_name": upload.file_name}),
                ),
            )
            .await?;

        Ok(ResumeIntakeOutcome {
            document_id,
            duplicate: false,
        })
    }

    /// Requirement intake: MD5 content hash as the dedupe key, `Pending`
    /// ingestion row, enqueue.
    pub async fn ingest_requirement(
        &self,
        tenant: &TenantContext,
        source: &str,
        raw_content: &str,
    ) -> Result<RequirementIntakeOutcome, AppError> {
        let content_hash = format!("{:x}", md5::compute(raw_content.as_bytes()));

        if let Some(existing) =
            RequirementIngestion::find_by_hash(&self.db, tenant, &content_hash).await?
        {
            info!(
                tenant = tenant.tenant_id(),
                ingestion_id = %existing.id,
                "duplicate requirement content short-circuited"
            );
            return Ok(RequirementIntakeOutcome {
                ingestion_id: existing.id,
                duplicate: true,
            });
        }

        let row = RequirementIngestion::new(tenant, source, raw_content, &content_hash);
        let ingestion_id = row.id.clone();
        self.db.store_tenant_item(tenant, row).await?;

        let payload = RequirementJobPayload {
            tenant_id: tenant.tenant_id().to_string(),
            ingestion_id: ingestion_id.clone(),
        };
        QueueJob::enqueue(
            &self.db,
            REQUIREMENT_INGESTION,
            serde_json::to_value(&payload)
                .map_err(|e| AppError::InternalError(format!("payload serialisation: {e}")))?,
            EnqueueOptions {
                dedupe_key: Some(content_hash.clone()),
                max_attempts: self.config.queue_max_attempts,
                high_water: self.config.queue_high_water,
            },
        )
        .await?;

        self.audit
            .record(
                tenant,
                AuditEvent::success(
                    "requirement.received",
                    "requirement_ingestion",
                    Some(ingestion_id.clone()),
                    json!({"content_hash": content_hash, "source": source}),
                ),
            )
            .await?;

        Ok(RequirementIntakeOutcome {
            ingestion_id,
            duplicate: false,
        })
    }
}

fn hex_digest<D: Digest>(bytes: &[u8]) -> String {
    let mut hasher = D::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Storage-key sanitisation: lowercase, collapse runs outside
/// `[a-z0-9._-]` to `-`, fall back to the SHA-1 of the name when nothing
/// survives.
pub fn sanitize_file_name(file_name: &str) -> String {
    let lowered = file_name.to_lowercase();
    let mut sanitized = String::with_capacity(lowered.len());
    let mut last_was_dash = false;

    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '.' | '_' | '-') {
            sanitized.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            sanitized.push('-');
            last_was_dash = true;
        }
    }

    if sanitized.chars().all(|ch| ch == '-' || ch == '.') {
        return hex_digest::<Sha1>(file_name.as_bytes());
    }
    sanitized
}


#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::types::queue_job::QueueJobStatus;

    #[test]
    fn sanitisation_lowers_and_collapses() {
        assert_eq!(sanitize_file_name("My Resume (v2).PDF"), "my-resume-v2-.pdf");
        assert_eq!(sanitize_file_name("clean_name-1.txt"), "clean_name-1.txt");
        // Nothing survives: fall back to the sha1 of the original name.
        let fallback = sanitize_file_name("日本語");
        assert_eq!(fallback.len(), 40);
        assert!(fallback.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn duplicate_resume_returns_existing_document_without_new_job() {
        let (service, tenant) = testing::memory_service().await;

        let upload = ResumeUpload {
            file_name: "resume.txt".to_string(),
            content_type: "text/plain".to_string(),
            bytes: Bytes::from_static(b"Jane Doe, TypeScript engineer"),
            source: "api".to_string(),
            consultant_id: None,
            requirement_id: None,
        };

        let first = service
            .ingest_resume(&tenant, upload.clone())
            .await
            .expect("first ingest");
        assert!(!first.duplicate);

        let second = service
            .ingest_resume(&tenant, upload)
            .await
            .expect("second ingest");
        assert!(second.duplicate);
        assert_eq!(first.document_id, second.document_id);

        // One asset, one metadata row, one queue job.
        let assets: Vec<DocumentAsset> = service
            .db()
            .list_tenant_items(&tenant)
            .await
            .expect("assets");
        assert_eq!(assets.len(), 1);
        let metadata: Vec<DocumentMetadata> = service
            .db()
            .list_tenant_items(&tenant)
            .await
            .expect("metadata");
        assert_eq!(metadata.len(), 1);
        assert_eq!(
            QueueJob::pending_count(service.db(), RESUME_INGESTION)
                .await
                .expect("pending"),
            1
        );
    }

    #[tokio::test]
    async fn resume_bytes_land_under_the_tenant_prefix() {
        let (service, tenant) = testing::memory_service().await;

        let outcome = service
            .ingest_resume(
                &tenant,
                ResumeUpload {
                    file_name: "Jane Doe Resume.txt".to_string(),
                    content_type: "text/plain".to_string(),
                    bytes: Bytes::from_static(b"content"),
                    source: "api".to_string(),
                    consultant_id: None,
                    requirement_id: None,
                },
            )
            .await
            .expect("ingest");

        let assets: Vec<DocumentAsset> = service
            .db()
            .list_tenant_items(&tenant)
            .await
            .expect("assets");
        assert_eq!(
            assets[0].storage_key,
            format!(
                "tenants/acme/documents/{}/jane-doe-resume.txt",
                outcome.document_id
            )
        );
    }

    #[tokio::test]
    async fn duplicate_requirement_content_is_skipped() {
        let (service, tenant) = testing::memory_service().await;

        let first = service
            .ingest_requirement(&tenant, "email", "Need a senior TypeScript engineer in Austin")
            .await
            .expect("first");
        let second = service
            .ingest_requirement(&tenant, "email", "Need a senior TypeScript engineer in Austin")
            .await
            .expect("second");

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.ingestion_id, second.ingestion_id);

        // The dedupe key also stops a second live queue job.
        let jobs: Vec<QueueJob> = service
            .db()
            .get_all_stored_items()
            .await
            .expect("jobs");
        let live: Vec<_> = jobs
            .iter()
            .filter(|j| j.queue == REQUIREMENT_INGESTION && j.status == QueueJobStatus::Waiting)
            .collect();
        assert_eq!(live.len(), 1);
    }
}
