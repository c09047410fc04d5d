use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

tenant_object!(Resume, "resume", {
    consultant_id: String,
    file_key: String,
    headline: Option<String>,
    summary: Option<String>,
    skills: Vec<String>,
    matched_skill_ids: Vec<String>,
    emails: Vec<String>,
    phones: Vec<String>
});

impl Resume {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant: &TenantContext,
        consultant_id: impl Into<String>,
        file_key: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            consultant_id: consultant_id.into(),
            file_key: file_key.into(),
            headline: None,
            summary: None,
            skills: Vec::new(),
            matched_skill_ids: Vec::new(),
            emails: Vec::new(),
            phones: Vec::new(),
        }
    }

    /// Upsert by `(tenant, consultant, file_key)`: a re-processed document
    /// refreshes the stored payload instead of accumulating rows.
    pub async fn upsert(db: &SurrealDbClient, tenant: &TenantContext, resume: Self) -> Result<Self, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM resume
                 WHERE tenant_id = $tenant AND consultant_id = $consultant AND file_key = $file_key
                 LIMIT 1",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("consultant", resume.consultant_id.clone()))
            .bind(("file_key", resume.file_key.clone()))
            .await?;
        let existing: Vec<Self> = response.take(0)?;

        match existing.into_iter().next() {
            Some(current) => {
                let mut updated = resume;
                updated.id = current.id.clone();
                updated.created_at = current.created_at;
                let stored: Option<Self> = db
                    .client
                    .update(("resume", current.id.as_str()))
                    .content(updated)
                    .await?;
                stored.ok_or_else(|| AppError::InternalError("resume upsert returned no row".into()))
            }
            None => {
                let stored = db.store_tenant_item(tenant, resume).await?;
                stored.ok_or_else(|| AppError::InternalError("resume insert returned no row".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_keeps_single_row_per_file_key() {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("resume_ns", &database)
            .await
            .expect("in-memory surrealdb");
        db.ensure_schema().await.expect("schema");
        let tenant = TenantContext::new("acme").expect("tenant");

        let mut first = Resume::new(&tenant, "c1", "tenants/acme/documents/d1/file.pdf");
        first.skills = vec!["TypeScript".to_string()];
        let stored = Resume::upsert(&db, &tenant, first).await.expect("insert");

        let mut second = Resume::new(&tenant, "c1", "tenants/acme/documents/d1/file.pdf");
        second.skills = vec!["TypeScript".to_string(), "React".to_string()];
        let updated = Resume::upsert(&db, &tenant, second).await.expect("update");

        assert_eq!(stored.id, updated.id);
        assert_eq!(updated.skills.len(), 2);

        let all: Vec<Resume> = db.list_tenant_items(&tenant).await.expect("list");
        assert_eq!(all.len(), 1);
    }
}
