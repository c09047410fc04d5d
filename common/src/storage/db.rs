use crate::error::AppError;
use crate::storage::TenantContext;

use super::types::{StoredObject, TenantScoped};
use futures::Stream;
use serde::Deserialize;
use std::{ops::Deref, sync::Arc};
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Notification, Surreal,
};

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

pub trait ProvidesDb {
    fn db(&self) -> &Arc<SurrealDbClient>;
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

impl SurrealDbClient {
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        // Sign in to database
        db.signin(Root { username, password }).await?;

        // Set namespace
        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// Apply the static schema: uniqueness constraints backing the dedupe
    /// invariants plus lookup indexes. Idempotent.
    pub async fn ensure_schema(&self) -> Result<(), Error> {
        self.client
            .query(
                "DEFINE INDEX IF NOT EXISTS idx_document_metadata_hash ON TABLE document_metadata FIELDS tenant_id, sha256 UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_requirement_ingestion_hash ON TABLE requirement_ingestion FIELDS tenant_id, content_hash UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_search_document_entity ON TABLE search_document FIELDS tenant_id, entity_type, entity_id UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_match_pair ON TABLE match_record FIELDS tenant_id, consultant_id, requirement_id UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_identity_signature ON TABLE identity_signature FIELDS tenant_id, kind, value, consultant_id UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_skill_name ON TABLE skill FIELDS name UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_ontology_node_name ON TABLE ontology_node FIELDS version_id, canonical_name UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_ontology_alias_value ON TABLE ontology_alias FIELDS node_id, value UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_pii_vault_token ON TABLE pii_vault FIELDS token UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_api_key_hash ON TABLE api_key FIELDS token_sha256 UNIQUE;
                 DEFINE INDEX IF NOT EXISTS idx_queue_job_queue_status ON TABLE queue_job FIELDS queue, status;
                 DEFINE INDEX IF NOT EXISTS idx_queue_job_created ON TABLE queue_job FIELDS created_at;
                 DEFINE INDEX IF NOT EXISTS idx_audit_tenant_created ON TABLE audit_log FIELDS tenant_id, created_at;
                 DEFINE INDEX IF NOT EXISTS idx_consultant_tenant ON TABLE consultant FIELDS tenant_id;
                 DEFINE INDEX IF NOT EXISTS idx_requirement_tenant ON TABLE requirement FIELDS tenant_id;
                 DEFINE INDEX IF NOT EXISTS idx_match_tenant ON TABLE match_record FIELDS tenant_id;",
            )
            .await?
            .check()?;
        Ok(())
    }

    pub async fn drop_table<T>(&self) -> Result<Vec<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client.delete(T::table_name()).await
    }

    /// Store an object under its own id. Global (non tenant-scoped) tables
    /// only; tenant rows go through [`Self::store_tenant_item`].
    pub async fn store_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    pub async fn get_all_stored_items<T>(&self) -> Result<Vec<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select(T::table_name()).await
    }

    pub async fn get_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select((T::table_name(), id)).await
    }

    pub async fn delete_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.delete((T::table_name(), id)).await
    }

    pub async fn listen<T>(
        &self,
    ) -> Result<impl Stream<Item = Result<Notification<T>, Error>>, Error>
    where
        T: for<'de> StoredObject + std::marker::Unpin,
    {
        self.client.select(T::table_name()).live().await
    }

    /// Store a tenant-partitioned row. The row must carry the caller's
    /// tenant id already; a mismatch is a validation error, never silently
    /// rewritten.
    pub async fn store_tenant_item<T>(
        &self,
        tenant: &TenantContext,
        item: T,
    ) -> Result<Option<T>, AppError>
    where
        T: TenantScoped + Send + Sync + 'static,
    {
        if item.tenant_id() != tenant.tenant_id() {
            return Err(AppError::Validation(format!(
                "attempted to store a {} row for tenant '{}' in context '{}'",
                T::table_name(),
                item.tenant_id(),
                tenant.tenant_id()
            )));
        }
        Ok(self
            .client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await?)
    }

    /// Tenant-filtered point lookup. A bare-key select would leak rows on
    /// cross-tenant id collisions, so the key lookup is rewritten into a
    /// filtered query.
    pub async fn get_tenant_item<T>(
        &self,
        tenant: &TenantContext,
        id: &str,
    ) -> Result<Option<T>, AppError>
    where
        T: TenantScoped,
    {
        let mut response = self
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE id = type::thing($table, $id) AND tenant_id = $tenant
                 LIMIT 1",
            )
            .bind(("table", T::table_name()))
            .bind(("id", id.to_owned()))
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .await?;
        let rows: Vec<T> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    pub async fn list_tenant_items<T>(&self, tenant: &TenantContext) -> Result<Vec<T>, AppError>
    where
        T: TenantScoped,
    {
        let mut response = self
            .client
            .query("SELECT * FROM type::table($table) WHERE tenant_id = $tenant")
            .bind(("table", T::table_name()))
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .await?;
        Ok(response.take(0)?)
    }

    pub async fn count_tenant_items<T>(&self, tenant: &TenantContext) -> Result<u64, AppError>
    where
        T: TenantScoped,
    {
        let mut response = self
            .client
            .query(
                "SELECT count() AS count FROM type::table($table)
                 WHERE tenant_id = $tenant GROUP ALL",
            )
            .bind(("table", T::table_name()))
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .await?;
        let rows: Vec<CountRow> = response.take(0)?;
        Ok(rows.first().map_or(0, |r| r.count))
    }

    /// Tenant-filtered delete. Returns the removed row, `None` when the id
    /// does not exist for this tenant (including cross-tenant ids).
    pub async fn delete_tenant_item<T>(
        &self,
        tenant: &TenantContext,
        id: &str,
    ) -> Result<Option<T>, AppError>
    where
        T: TenantScoped,
    {
        let mut response = self
            .client
            .query(
                "DELETE type::thing($table, $id)
                 WHERE tenant_id = $tenant RETURN BEFORE",
            )
            .bind(("table", T::table_name()))
            .bind(("id", id.to_owned()))
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .await?;
        let rows: Vec<T> = response.take(0)?;
        Ok(rows.into_iter().next())
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}

#[cfg(test)]
mod tests {
    use crate::tenant_object;

    use super::*;
    use uuid::Uuid;

    tenant_object!(Widget, "widget", {
        name: String
    });

    async fn memory_db() -> SurrealDbClient {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("test_ns", &database)
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_schema().await.expect("Failed to apply schema");
        db
    }

    fn widget(tenant: &str, id: &str, name: &str) -> Widget {
        let now = chrono::Utc::now();
        Widget {
            id: id.to_string(),
            tenant_id: tenant.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn tenant_crud_round_trip() {
        let db = memory_db().await;
        let tenant = TenantContext::new("acme").expect("tenant");

        let item = widget("acme", "w1", "first");
        let stored = db
            .store_tenant_item(&tenant, item.clone())
            .await
            .expect("store");
        assert!(stored.is_some());

        let fetched: Option<Widget> = db.get_tenant_item(&tenant, "w1").await.expect("get");
        assert_eq!(fetched, Some(item.clone()));

        assert_eq!(db.count_tenant_items::<Widget>(&tenant).await.expect("count"), 1);

        let deleted: Option<Widget> = db.delete_tenant_item(&tenant, "w1").await.expect("delete");
        assert_eq!(deleted, Some(item));
        assert_eq!(db.count_tenant_items::<Widget>(&tenant).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn cross_tenant_lookups_return_nothing() {
        let db = memory_db().await;
        let acme = TenantContext::new("acme").expect("tenant");
        let globex = TenantContext::new("globex").expect("tenant");

        db.store_tenant_item(&acme, widget("acme", "shared-id", "acme widget"))
            .await
            .expect("store");

        // Same primary key, different tenant context: must not leak.
        let leaked: Option<Widget> = db
            .get_tenant_item(&globex, "shared-id")
            .await
            .expect("get");
        assert!(leaked.is_none());

        let listed: Vec<Widget> = db.list_tenant_items(&globex).await.expect("list");
        assert!(listed.is_empty());

        // Cross-tenant delete is a no-op and the row survives.
        let deleted: Option<Widget> = db
            .delete_tenant_item(&globex, "shared-id")
            .await
            .expect("delete");
        assert!(deleted.is_none());
        let still_there: Option<Widget> = db
            .get_tenant_item(&acme, "shared-id")
            .await
            .expect("get");
        assert!(still_there.is_some());
    }

    #[tokio::test]
    async fn store_rejects_context_mismatch() {
        let db = memory_db().await;
        let tenant = TenantContext::new("acme").expect("tenant");

        let foreign = widget("globex", "w9", "not ours");
        let err = db
            .store_tenant_item(&tenant, foreign)
            .await
            .expect_err("mismatched tenant must be rejected");
        assert!(matches!(err, AppError::Validation(_)));
    }
}
