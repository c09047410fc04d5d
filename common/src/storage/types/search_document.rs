use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SearchEntityType {
    Consultant,
    Requirement,
}

tenant_object!(SearchDocument, "search_document", {
    entity_type: SearchEntityType,
    entity_id: String,
    content: String,
    metadata: Value,
    embedding: Vec<f32>
});

impl SearchDocument {
    pub fn new(
        tenant: &TenantContext,
        entity_type: SearchEntityType,
        entity_id: impl Into<String>,
        content: impl Into<String>,
        metadata: Value,
        embedding: Vec<f32>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            entity_type,
            entity_id: entity_id.into(),
            content: content.into(),
            metadata,
            embedding,
        }
    }

    /// Upsert by `(tenant, entity_type, entity_id)`; one search document per
    /// entity.
    pub async fn upsert(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        document: Self,
    ) -> Result<(), AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM search_document
                 WHERE tenant_id = $tenant AND entity_type = $entity_type AND entity_id = $entity_id
                 LIMIT 1",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("entity_type", document.entity_type))
            .bind(("entity_id", document.entity_id.clone()))
            .await?;
        let existing: Vec<Self> = response.take(0)?;

        match existing.into_iter().next() {
            Some(current) => {
                let mut updated = document;
                updated.id = current.id.clone();
                updated.created_at = current.created_at;
                let _: Option<Self> = db
                    .client
                    .update(("search_document", current.id.as_str()))
                    .content(updated)
                    .await?;
            }
            None => {
                db.store_tenant_item(tenant, document).await?;
            }
        }
        Ok(())
    }

    pub async fn remove(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        entity_type: SearchEntityType,
        entity_id: &str,
    ) -> Result<(), AppError> {
        db.client
            .query(
                "DELETE search_document
                 WHERE tenant_id = $tenant AND entity_type = $entity_type AND entity_id = $entity_id",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("entity_type", entity_type))
            .bind(("entity_id", entity_id.to_owned()))
            .await?
            .check()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_replaces_existing_entity_row() {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("searchdoc_ns", &database)
            .await
            .expect("in-memory surrealdb");
        db.ensure_schema().await.expect("schema");
        let tenant = TenantContext::new("acme").expect("tenant");

        let first = SearchDocument::new(
            &tenant,
            SearchEntityType::Consultant,
            "c1",
            "old content",
            serde_json::json!({}),
            vec![0.0; 4],
        );
        SearchDocument::upsert(&db, &tenant, first).await.expect("insert");

        let second = SearchDocument::new(
            &tenant,
            SearchEntityType::Consultant,
            "c1",
            "new content",
            serde_json::json!({"skills": ["Rust"]}),
            vec![1.0; 4],
        );
        SearchDocument::upsert(&db, &tenant, second).await.expect("update");

        let all: Vec<SearchDocument> = db.list_tenant_items(&tenant).await.expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "new content");
    }
}
