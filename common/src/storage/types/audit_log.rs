use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

tenant_object!(AuditLog, "audit_log", {
    actor_role: Option<String>,
    action: String,
    entity_type: String,
    entity_id: Option<String>,
    payload: Value,
    result_code: String,
    prev_hash: Option<String>,
    hash: String
});

impl AuditLog {
    pub fn fresh_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Tail of the tenant's chain.
    pub async fn latest_for_tenant(
        db: &SurrealDbClient,
        tenant: &TenantContext,
    ) -> Result<Option<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM audit_log
                 WHERE tenant_id = $tenant
                 ORDER BY created_at DESC
                 LIMIT 1",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .await?;
        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Full chain in insertion order, for verification and operator review.
    pub async fn list_for_tenant_asc(
        db: &SurrealDbClient,
        tenant: &TenantContext,
    ) -> Result<Vec<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM audit_log
                 WHERE tenant_id = $tenant
                 ORDER BY created_at ASC",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .await?;
        Ok(response.take(0)?)
    }
}
