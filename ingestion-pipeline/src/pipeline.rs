use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use common::audit::{AuditEvent, AuditRecorder};
use common::error::AppError;
use common::queue::{JobHandler, REQUIREMENT_INGESTION, RESUME_INGESTION};
use common::resilience::{CircuitBreakerConfig, CircuitBreakerRegistry};
use common::storage::db::SurrealDbClient;
use common::storage::store::StorageManager;
use common::storage::types::consultant_skill::ConsultantSkill;
use common::storage::types::document_metadata::{DocumentMetadata, IngestionStatus, PiiStatus};
use common::storage::types::queue_job::QueueJob;
use common::storage::types::requirement::Requirement;
use common::storage::types::requirement_ingestion::{
    RequirementIngestion, RequirementIngestionStatus,
};
use common::storage::types::requirement_skill::RequirementSkill;
use common::storage::types::resume::Resume;
use common::storage::types::skill::Skill;
use common::storage::TenantContext;
use common::utils::crypto::PiiVaultCrypto;
use search_index::SearchIndex;

use crate::extraction::{extract_text, OcrEngine};
use crate::ner::{NamedEntityRecognizer, RegexNer};
use crate::pii::{vault_findings, PiiRedactor};
use crate::requirement::RequirementParser;
use crate::resolve::{refresh_signatures, resolve_consultant, CandidateFacts};
use crate::skills::{headline, match_skills, summarize};

const SUMMARY_MAX_CHARS: usize = 400;
const DEFAULT_SKILL_WEIGHT: u32 = 50;

/// Job payload for `resume.ingestion`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeJobPayload {
    pub tenant_id: String,
    pub document_id: String,
    pub storage_key: String,
    pub content_type: String,
    pub source: String,
    pub consultant_id: Option<String>,
    pub requirement_id: Option<String>,
}

/// Job payload for `requirement.ingestion`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementJobPayload {
    pub tenant_id: String,
    pub ingestion_id: String,
}

/// Worker side of the resume path: extraction, NER, redaction, skill
/// normalisation, consultant resolution, signature refresh and index
/// refresh.
pub struct ResumeIngestionPipeline {
    db: Arc<SurrealDbClient>,
    storage: StorageManager,
    search_index: SearchIndex,
    audit: Arc<AuditRecorder>,
    ner: Arc<dyn NamedEntityRecognizer>,
    ocr: Option<Arc<dyn OcrEngine>>,
    redactor: PiiRedactor,
    crypto: PiiVaultCrypto,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl ResumeIngestionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<SurrealDbClient>,
        storage: StorageManager,
        search_index: SearchIndex,
        audit: Arc<AuditRecorder>,
        ner: Arc<dyn NamedEntityRecognizer>,
        ocr: Option<Arc<dyn OcrEngine>>,
        crypto: PiiVaultCrypto,
        breakers: Arc<CircuitBreakerRegistry>,
    ) -> Self {
        Self {
            db,
            storage,
            search_index,
            audit,
            ner,
            ocr,
            redactor: PiiRedactor::new(),
            crypto,
            breakers,
        }
    }

    async fn process(&self, payload: &ResumeJobPayload) -> Result<(), AppError> {
        let tenant = TenantContext::new(payload.tenant_id.clone())?;
        let started = Instant::now();

        DocumentMetadata::set_status(
            &self.db,
            &tenant,
            &payload.document_id,
            IngestionStatus::Processing,
        )
        .await?;

        let breaker = self
            .breakers
            .get_or_create_with_config("file_storage", CircuitBreakerConfig::file_storage());
        let storage = self.storage.clone();
        let key = payload.storage_key.clone();
        let bytes = breaker
            .call(move || async move { storage.get(&key).await })
            .await?;

        let extracted = extract_text(&bytes, &payload.content_type, self.ocr.as_deref()).await;
        let text = extracted.text;

        // NER with the deterministic regex fallback when the collaborator
        // is unavailable.
        let persons = match self.ner.recognize(&text).await {
            Ok(entities) => entities,
            Err(err) => {
                warn!(error = %err, "NER collaborator failed; using regex fallback");
                RegexNer::new().recognize(&text).await?
            }
        };

        let redaction = self.redactor.redact(&text, &persons, &self.crypto);
        let vault_ids = vault_findings(&self.db, &self.crypto, &redaction.findings).await?;

        // Skills and display strings come from the redacted text; contact
        // facts come from the findings' originals.
        let matched = match_skills(&self.db, &redaction.redacted_text).await?;
        let facts = CandidateFacts::derive(
            &persons,
            &redaction.findings,
            headline(&redaction.redacted_text),
        );
        let summary = summarize(&redaction.redacted_text, SUMMARY_MAX_CHARS);

        let consultant = resolve_consultant(
            &self.db,
            &tenant,
            payload.consultant_id.as_deref(),
            &facts,
        )
        .await?;

        // Merge newly matched skills into the consultant's edge set,
        // keeping existing weights.
        let mut edges =
            ConsultantSkill::weights_for_consultant(&self.db, &tenant, &consultant.id).await?;
        for skill in &matched {
            edges
                .entry(skill.skill_id.clone())
                .or_insert(DEFAULT_SKILL_WEIGHT);
        }
        let edges: Vec<(String, u32)> = edges.into_iter().collect();
        ConsultantSkill::replace_for_consultant(&self.db, &tenant, &consultant.id, &edges).await?;

        let mut resume = Resume::new(&tenant, consultant.id.clone(), payload.storage_key.clone());
        resume.headline = facts.headline.clone();
        resume.summary = Some(summary);
        resume.skills = matched.iter().map(|s| s.name.clone()).collect();
        resume.matched_skill_ids = matched.iter().map(|s| s.skill_id.clone()).collect();
        resume.emails = facts.emails.clone();
        resume.phones = facts.phones.clone();
        Resume::upsert(&self.db, &tenant, resume).await?;

        refresh_signatures(&self.db, &tenant, &consultant).await?;

        let pii_status = if redaction.findings.is_empty() {
            PiiStatus::Clean
        } else {
            PiiStatus::Flagged
        };
        DocumentMetadata::complete_ingestion(
            &self.db,
            &tenant,
            &payload.document_id,
            pii_status,
            redaction.summary(&vault_ids),
            redaction.redacted_text.len() as u64,
            extracted.page_count,
            started.elapsed().as_millis() as u64,
        )
        .await?;

        self.search_index
            .index_consultant(&tenant, &consultant.id)
            .await?;

        self.audit
            .record(
                &tenant,
                AuditEvent::success(
                    "resume.ingested",
                    "document",
                    Some(payload.document_id.clone()),
                    json!({
                        "consultant_id": consultant.id,
                        "matched_skills": matched.len(),
                        "pii_findings": redaction.findings.len(),
                    }),
                ),
            )
            .await?;

        info!(
            tenant = tenant.tenant_id(),
            document_id = %payload.document_id,
            consultant_id = %consultant.id,
            latency_ms = started.elapsed().as_millis() as u64,
            "resume ingested"
        );
        Ok(())
    }
}

#[async_trait]
impl JobHandler for ResumeIngestionPipeline {
    fn queue(&self) -> &str {
        RESUME_INGESTION
    }

    async fn handle(&self, job: &QueueJob) -> Result<(), AppError> {
        let payload: ResumeJobPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| AppError::Fatal(format!("malformed resume job payload: {e}")))?;
        let tenant = TenantContext::new(payload.tenant_id.clone())?;

        match self.process(&payload).await {
            Ok(()) => Ok(()),
            Err(err) => {
                DocumentMetadata::set_status(
                    &self.db,
                    &tenant,
                    &payload.document_id,
                    IngestionStatus::Failed,
                )
                .await
                .ok();
                self.audit
                    .record(
                        &tenant,
                        AuditEvent::failure(
                            "resume.ingested",
                            "document",
                            Some(payload.document_id.clone()),
                            json!({"error": err.to_string()}),
                            err.result_code(),
                        ),
                    )
                    .await
                    .ok();
                Err(err)
            }
        }
    }
}

/// Worker side of the requirement path: structured extraction, skill
/// resolution, requirement upsert by `(tenant, title, client)` and index
/// refresh.
pub struct RequirementIngestionPipeline {
    db: Arc<SurrealDbClient>,
    search_index: SearchIndex,
    audit: Arc<AuditRecorder>,
    parser: Arc<dyn RequirementParser>,
    breakers: Arc<CircuitBreakerRegistry>,
}

impl RequirementIngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        search_index: SearchIndex,
        audit: Arc<AuditRecorder>,
        parser: Arc<dyn RequirementParser>,
        breakers: Arc<CircuitBreakerRegistry>,
    ) -> Self {
        Self {
            db,
            search_index,
            audit,
            parser,
            breakers,
        }
    }

    async fn process(
        &self,
        tenant: &TenantContext,
        row: &RequirementIngestion,
    ) -> Result<String, AppError> {
        let started = Instant::now();

        let breaker = self
            .breakers
            .get_or_create_with_config("ai_service", CircuitBreakerConfig::ai_service());
        let parser = Arc::clone(&self.parser);
        let raw = row.raw_content.clone();
        let parsed = breaker
            .call(move || async move { parser.parse(&raw).await })
            .await?;

        let mut skill_edges: Vec<(String, u32)> = Vec::with_capacity(parsed.skills.len());
        for name in &parsed.skills {
            let skill = Skill::get_or_create(&self.db, name).await?;
            skill_edges.push((skill.id, DEFAULT_SKILL_WEIGHT));
        }

        let existing = Requirement::find_by_title_client_ci(
            &self.db,
            tenant,
            &parsed.title,
            &parsed.client_name,
        )
        .await?;

        let requirement_id = match existing {
            Some(requirement) => {
                if let Some(location) = &parsed.location {
                    self.db
                        .client
                        .query(
                            "UPDATE type::thing('requirement', $id)
                             SET location = $location, updated_at = time::now()
                             WHERE tenant_id = $tenant",
                        )
                        .bind(("id", requirement.id.clone()))
                        .bind(("location", location.clone()))
                        .bind(("tenant", tenant.tenant_id().to_owned()))
                        .await?
                        .check()?;
                }
                requirement.id
            }
            None => {
                let mut requirement = Requirement::new(
                    tenant,
                    parsed.title.clone(),
                    parsed.client_name.clone(),
                    row.raw_content.clone(),
                    row.source.clone(),
                );
                requirement.location = parsed.location.clone();
                requirement.max_rate = parsed.suggested_rate;
                let requirement_id = requirement.id.clone();
                self.db.store_tenant_item(tenant, requirement).await?;
                requirement_id
            }
        };

        RequirementSkill::replace_for_requirement(&self.db, tenant, &requirement_id, &skill_edges)
            .await?;

        RequirementIngestion::mark_processed(
            &self.db,
            tenant,
            &row.id,
            serde_json::to_value(&parsed)
                .map_err(|e| AppError::InternalError(format!("parsed data serialisation: {e}")))?,
            started.elapsed().as_millis() as u64,
        )
        .await?;

        self.search_index
            .index_requirement(tenant, &requirement_id)
            .await?;

        self.audit
            .record(
                tenant,
                AuditEvent::success(
                    "requirement.ingested",
                    "requirement",
                    Some(requirement_id.clone()),
                    json!({"title": parsed.title, "client": parsed.client_name}),
                ),
            )
            .await?;

        Ok(requirement_id)
    }
}

#[async_trait]
impl JobHandler for RequirementIngestionPipeline {
    fn queue(&self) -> &str {
        REQUIREMENT_INGESTION
    }

    async fn handle(&self, job: &QueueJob) -> Result<(), AppError> {
        let payload: RequirementJobPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| AppError::Fatal(format!("malformed requirement job payload: {e}")))?;
        let tenant = TenantContext::new(payload.tenant_id.clone())?;

        let Some(row): Option<RequirementIngestion> = self
            .db
            .get_tenant_item(&tenant, &payload.ingestion_id)
            .await?
        else {
            return Err(AppError::NotFound(format!(
                "requirement ingestion {}",
                payload.ingestion_id
            )));
        };

        // Re-delivered job for an already processed row: at-least-once
        // delivery makes this a no-op, not an error.
        if row.status == RequirementIngestionStatus::Processed {
            return Ok(());
        }

        match self.process(&tenant, &row).await {
            Ok(_) => Ok(()),
            Err(err) => {
                RequirementIngestion::mark_failed(&self.db, &tenant, &row.id)
                    .await
                    .ok();
                self.audit
                    .record(
                        &tenant,
                        AuditEvent::failure(
                            "requirement.ingested",
                            "requirement_ingestion",
                            Some(row.id.clone()),
                            json!({"error": err.to_string()}),
                            err.result_code(),
                        ),
                    )
                    .await
                    .ok();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{testing::memory_service, ResumeUpload};
    use crate::requirement::RuleBasedRequirementParser;
    use bytes::Bytes;
    use chrono::Utc;
    use common::storage::types::consultant::Consultant;
    use common::storage::types::search_document::SearchDocument;
    use common::utils::config::AppConfig;
    use common::utils::embedding::EmbeddingProvider;

    async fn build_pipelines() -> (
        ResumeIngestionPipeline,
        RequirementIngestionPipeline,
        crate::intake::IngestionService,
        TenantContext,
    ) {
        let (service, tenant) = memory_service().await;
        let db = Arc::clone(service.db());
        common::storage::indexes::ensure_runtime_indexes(&db, 64)
            .await
            .expect("indexes");

        let config = AppConfig::test_defaults();
        let storage = common::storage::store::testing::memory_storage().await;
        let embedder = Arc::new(EmbeddingProvider::new_hashed(64).expect("embedder"));
        let search = SearchIndex::new(Arc::clone(&db), embedder, &config);
        let audit = Arc::new(AuditRecorder::new(Arc::clone(&db)));
        let breakers = Arc::new(CircuitBreakerRegistry::default());
        let crypto = PiiVaultCrypto::new("test-secret", "pii");

        let resume_pipeline = ResumeIngestionPipeline::new(
            Arc::clone(&db),
            storage,
            search.clone(),
            Arc::clone(&audit),
            Arc::new(RegexNer::new()),
            None,
            crypto,
            Arc::clone(&breakers),
        );
        let requirement_pipeline = RequirementIngestionPipeline::new(
            db,
            search,
            audit,
            Arc::new(RuleBasedRequirementParser::new()),
            breakers,
        );
        (resume_pipeline, requirement_pipeline, service, tenant)
    }

    #[tokio::test]
    async fn resume_job_flows_end_to_end() {
        let (resume_pipeline, _, _service, tenant) = build_pipelines().await;
        let db = Arc::clone(&resume_pipeline.db);

        db.store_item(Skill::new("TypeScript", None)).await.expect("skill");

        // Write the document bytes to the pipeline's storage directly and
        // craft the job the intake path would have enqueued.
        let text = b"Contact Jane Doe at jane.doe@acme.io or 415-555-0134\nTypeScript engineer";
        resume_pipeline
            .storage
            .put("tenants/acme/documents/d1/resume.txt", Bytes::from_static(text))
            .await
            .expect("seed storage");

        let metadata = DocumentMetadata::new(&tenant, "d1", "sha", "sha1", "md5");
        db.store_tenant_item(&tenant, metadata).await.expect("metadata");

        let payload = ResumeJobPayload {
            tenant_id: "acme".to_string(),
            document_id: "d1".to_string(),
            storage_key: "tenants/acme/documents/d1/resume.txt".to_string(),
            content_type: "text/plain".to_string(),
            source: "api".to_string(),
            consultant_id: None,
            requirement_id: None,
        };
        let job = QueueJob {
            id: "job-1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            queue: RESUME_INGESTION.to_string(),
            payload: serde_json::to_value(&payload).expect("payload"),
            dedupe_key: None,
            status: common::storage::types::queue_job::QueueJobStatus::Active,
            attempts: 1,
            max_attempts: 3,
            not_before: None,
            claimed_by: None,
            lease_expires_at: None,
            failure: None,
        };

        resume_pipeline.handle(&job).await.expect("handle");

        // Metadata: complete + flagged with three findings.
        let metadata = DocumentMetadata::find_by_document_id(&db, &tenant, "d1")
            .await
            .expect("query")
            .expect("metadata");
        assert_eq!(metadata.ingestion_status, IngestionStatus::Complete);
        assert_eq!(metadata.pii_status, PiiStatus::Flagged);
        assert_eq!(metadata.pii_summary["counts"]["email"], 1);
        assert_eq!(metadata.pii_summary["counts"]["phone"], 1);
        assert_eq!(metadata.pii_summary["counts"]["person"], 1);
        assert!(metadata.text_byte_size.is_some());
        assert!(metadata.ingestion_latency_ms.is_some());

        // Consultant resolved from the email finding.
        let consultants: Vec<Consultant> = db.list_tenant_items(&tenant).await.expect("list");
        assert_eq!(consultants.len(), 1);
        assert_eq!(consultants[0].first_name, "Jane");
        assert_eq!(consultants[0].email.as_deref(), Some("jane.doe@acme.io"));

        // Resume row with the matched skill, search document refreshed.
        let resumes: Vec<Resume> = db.list_tenant_items(&tenant).await.expect("resumes");
        assert_eq!(resumes.len(), 1);
        assert_eq!(resumes[0].skills, vec!["TypeScript"]);
        assert!(resumes[0].summary.as_deref().is_some_and(|s| !s.contains("jane.doe@acme.io")));

        let documents: Vec<SearchDocument> = db.list_tenant_items(&tenant).await.expect("docs");
        assert_eq!(documents.len(), 1);
    }

    #[tokio::test]
    async fn requirement_job_creates_and_then_updates() {
        let (_, requirement_pipeline, service, tenant) = build_pipelines().await;
        let db = Arc::clone(&requirement_pipeline.db);

        let raw = "Title: Senior TypeScript Engineer\nClient: Initech\nLocation: Austin, TX\nSkills: TypeScript, React";
        let outcome = service
            .ingest_requirement(&tenant, "email", raw)
            .await
            .expect("intake");

        let job_payload = RequirementJobPayload {
            tenant_id: "acme".to_string(),
            ingestion_id: outcome.ingestion_id.clone(),
        };
        let job = QueueJob {
            id: "job-r1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            queue: REQUIREMENT_INGESTION.to_string(),
            payload: serde_json::to_value(&job_payload).expect("payload"),
            dedupe_key: None,
            status: common::storage::types::queue_job::QueueJobStatus::Active,
            attempts: 1,
            max_attempts: 3,
            not_before: None,
            claimed_by: None,
            lease_expires_at: None,
            failure: None,
        };

        requirement_pipeline.handle(&job).await.expect("handle");

        let requirements: Vec<Requirement> = db.list_tenant_items(&tenant).await.expect("reqs");
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].title, "Senior TypeScript Engineer");
        assert_eq!(requirements[0].location.as_deref(), Some("Austin, TX"));

        let ingestion: RequirementIngestion = db
            .get_tenant_item(&tenant, &outcome.ingestion_id)
            .await
            .expect("get")
            .expect("row");
        assert_eq!(ingestion.status, RequirementIngestionStatus::Processed);
        assert!(ingestion.latency_ms.is_some());

        // A second ingestion for the same title+client updates in place.
        let raw2 = "Title: Senior TypeScript Engineer\nClient: INITECH\nSkills: TypeScript, Node";
        let outcome2 = service
            .ingest_requirement(&tenant, "email", raw2)
            .await
            .expect("intake 2");
        let job2 = QueueJob {
            payload: serde_json::to_value(&RequirementJobPayload {
                tenant_id: "acme".to_string(),
                ingestion_id: outcome2.ingestion_id,
            })
            .expect("payload"),
            id: "job-r2".to_string(),
            ..job
        };
        requirement_pipeline.handle(&job2).await.expect("handle 2");

        let requirements: Vec<Requirement> = db.list_tenant_items(&tenant).await.expect("reqs");
        assert_eq!(requirements.len(), 1);

        let skills: Vec<RequirementSkill> = db.list_tenant_items(&tenant).await.expect("edges");
        assert_eq!(skills.len(), 2); // TypeScript + Node after replacement
    }

    #[tokio::test]
    async fn processed_rows_are_idempotent_on_redelivery() {
        let (_, requirement_pipeline, service, tenant) = build_pipelines().await;

        let outcome = service
            .ingest_requirement(&tenant, "api", "Title: Data Engineer\nClient: Acme")
            .await
            .expect("intake");
        let payload = RequirementJobPayload {
            tenant_id: "acme".to_string(),
            ingestion_id: outcome.ingestion_id,
        };
        let job = QueueJob {
            id: "job-x".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            queue: REQUIREMENT_INGESTION.to_string(),
            payload: serde_json::to_value(&payload).expect("payload"),
            dedupe_key: None,
            status: common::storage::types::queue_job::QueueJobStatus::Active,
            attempts: 1,
            max_attempts: 3,
            not_before: None,
            claimed_by: None,
            lease_expires_at: None,
            failure: None,
        };

        requirement_pipeline.handle(&job).await.expect("first delivery");
        requirement_pipeline.handle(&job).await.expect("redelivery is a no-op");

        let requirements: Vec<Requirement> = requirement_pipeline
            .db
            .list_tenant_items(&tenant)
            .await
            .expect("reqs");
        assert_eq!(requirements.len(), 1);
    }

    #[tokio::test]
    async fn handler_queues_are_fixed() {
        let (resume_pipeline, requirement_pipeline, _service, _tenant) = build_pipelines().await;
        assert_eq!(resume_pipeline.queue(), RESUME_INGESTION);
        assert_eq!(requirement_pipeline.queue(), REQUIREMENT_INGESTION);
    }
}
