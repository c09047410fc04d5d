use tracing::{debug, info};

use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::consultant::Consultant;
use common::storage::types::identity_signature::IdentitySignature;
use common::storage::types::pii_vault::PiiType;
use common::storage::TenantContext;

use crate::ner::Entity;
use crate::pii::PiiFinding;

/// Contact facts distilled from a processed resume, the inputs to
/// consultant resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFacts {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub location: Option<String>,
    pub headline: Option<String>,
}

impl CandidateFacts {
    /// Assemble from the NER person entities and the redaction findings.
    /// Originals come from the findings, never from the redacted text.
    pub fn derive(
        person_entities: &[Entity],
        findings: &[PiiFinding],
        headline: Option<String>,
    ) -> Self {
        let full_name = person_entities.first().map(|entity| entity.text.clone());
        let (first_name, last_name) = match &full_name {
            Some(name) => {
                let mut parts = name.split_whitespace();
                let first = parts.next().map(str::to_string);
                let last = parts.last().map(str::to_string);
                (first, last)
            }
            None => (None, None),
        };

        let emails = findings
            .iter()
            .filter(|f| f.pii_type == PiiType::Email)
            .map(|f| f.original.clone())
            .collect();
        let phones = findings
            .iter()
            .filter(|f| f.pii_type == PiiType::Phone)
            .map(|f| f.original.clone())
            .collect();

        Self {
            first_name,
            last_name,
            full_name,
            emails,
            phones,
            location: None,
            headline,
        }
    }
}

/// Resolve the consultant a resume belongs to, in order: the document's
/// existing consultant link, then email, then phone, then a fresh stub.
pub async fn resolve_consultant(
    db: &SurrealDbClient,
    tenant: &TenantContext,
    linked_consultant_id: Option<&str>,
    facts: &CandidateFacts,
) -> Result<Consultant, AppError> {
    if let Some(consultant_id) = linked_consultant_id {
        if let Some(consultant) = db.get_tenant_item(tenant, consultant_id).await? {
            debug!(consultant_id, "resolved consultant via document link");
            return Ok(consultant);
        }
    }

    for email in &facts.emails {
        if let Some(consultant) = Consultant::find_by_email_ci(db, tenant, email).await? {
            debug!(consultant_id = %consultant.id, "resolved consultant via email");
            return Ok(consultant);
        }
    }

    for phone in &facts.phones {
        if let Some(consultant) = Consultant::find_by_phone_digits(db, tenant, phone).await? {
            debug!(consultant_id = %consultant.id, "resolved consultant via phone");
            return Ok(consultant);
        }
    }

    let mut stub = Consultant::new_stub(
        tenant,
        facts.first_name.clone().unwrap_or_else(|| "Unknown".to_string()),
        facts.last_name.clone().unwrap_or_else(|| "Candidate".to_string()),
    );
    stub.email = facts.emails.first().cloned();
    stub.phone = facts.phones.first().cloned();
    stub.location = facts.location.clone();
    stub.summary = facts.headline.clone();

    let stored = db.store_tenant_item(tenant, stub).await?;
    let consultant =
        stored.ok_or_else(|| AppError::InternalError("consultant insert returned no row".into()))?;
    info!(consultant_id = %consultant.id, "created consultant stub from resume");
    Ok(consultant)
}

/// Re-derive and replace the consultant's identity signatures. Called
/// after every consultant mutation.
pub async fn refresh_signatures(
    db: &SurrealDbClient,
    tenant: &TenantContext,
    consultant: &Consultant,
) -> Result<(), AppError> {
    let signatures = IdentitySignature::derive(
        tenant,
        &consultant.id,
        consultant.email.as_deref(),
        consultant.phone.as_deref(),
        &consultant.first_name,
        &consultant.last_name,
        consultant.location.as_deref(),
    );
    IdentitySignature::replace_for_consultant(db, tenant, &consultant.id, signatures).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn memory_db() -> SurrealDbClient {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("resolve_ns", &database)
            .await
            .expect("in-memory surrealdb");
        db.ensure_schema().await.expect("schema");
        db
    }

    fn facts_with_email(email: &str) -> CandidateFacts {
        CandidateFacts {
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            full_name: Some("Jane Doe".to_string()),
            emails: vec![email.to_string()],
            ..CandidateFacts::default()
        }
    }

    #[tokio::test]
    async fn resolution_prefers_existing_link() {
        let db = memory_db().await;
        let tenant = TenantContext::new("acme").expect("tenant");

        let linked = Consultant::new_stub(&tenant, "Existing", "Person");
        let linked_id = linked.id.clone();
        db.store_tenant_item(&tenant, linked).await.expect("store");

        let resolved = resolve_consultant(
            &db,
            &tenant,
            Some(&linked_id),
            &facts_with_email("jane@acme.io"),
        )
        .await
        .expect("resolve");
        assert_eq!(resolved.id, linked_id);
    }

    #[tokio::test]
    async fn resolution_falls_back_to_email_then_phone_then_stub() {
        let db = memory_db().await;
        let tenant = TenantContext::new("acme").expect("tenant");

        // No match at all: a stub is created.
        let stub = resolve_consultant(&db, &tenant, None, &facts_with_email("jane@acme.io"))
            .await
            .expect("resolve");
        assert_eq!(stub.first_name, "Jane");
        assert_eq!(stub.email.as_deref(), Some("jane@acme.io"));

        // Same email resolves back to the stub.
        let second = resolve_consultant(&db, &tenant, None, &facts_with_email("JANE@ACME.IO"))
            .await
            .expect("resolve");
        assert_eq!(second.id, stub.id);

        // Phone-only facts resolve via digits.
        let mut phone_consultant = Consultant::new_stub(&tenant, "Sam", "Okafor");
        phone_consultant.phone = Some("(415) 555-0134".to_string());
        let phone_id = phone_consultant.id.clone();
        db.store_tenant_item(&tenant, phone_consultant)
            .await
            .expect("store");

        let facts = CandidateFacts {
            phones: vec!["415.555.0134".to_string()],
            ..CandidateFacts::default()
        };
        let by_phone = resolve_consultant(&db, &tenant, None, &facts)
            .await
            .expect("resolve");
        assert_eq!(by_phone.id, phone_id);
    }

    #[tokio::test]
    async fn refresh_replaces_signature_set() {
        let db = memory_db().await;
        let tenant = TenantContext::new("acme").expect("tenant");

        let mut consultant = Consultant::new_stub(&tenant, "Jane", "Doe");
        consultant.email = Some("jane@acme.io".to_string());
        db.store_tenant_item(&tenant, consultant.clone())
            .await
            .expect("store");

        refresh_signatures(&db, &tenant, &consultant).await.expect("refresh");
        let signatures: Vec<IdentitySignature> =
            db.list_tenant_items(&tenant).await.expect("list");
        assert_eq!(signatures.len(), 2); // email + name_loc

        consultant.email = None;
        refresh_signatures(&db, &tenant, &consultant).await.expect("refresh");
        let signatures: Vec<IdentitySignature> =
            db.list_tenant_items(&tenant).await.expect("list");
        assert_eq!(signatures.len(), 1); // name_loc only
    }
}
