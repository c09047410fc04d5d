use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

tenant_object!(ApiKey, "api_key", {
    token_sha256: String,
    label: String
});

impl ApiKey {
    /// Only the SHA-256 of the bearer token is stored.
    pub fn new(tenant: &TenantContext, token: &str, label: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            token_sha256: Self::hash_token(token),
            label: label.into(),
        }
    }

    pub fn hash_token(token: &str) -> String {
        let digest = Sha256::digest(token.as_bytes());
        format!("{digest:x}")
    }

    /// Resolve a bearer token to its tenant. `None` for unknown tokens.
    pub async fn resolve_tenant(
        db: &SurrealDbClient,
        token: &str,
    ) -> Result<Option<String>, AppError> {
        let mut response = db
            .client
            .query("SELECT * FROM api_key WHERE token_sha256 = $hash LIMIT 1")
            .bind(("hash", Self::hash_token(token)))
            .await?;
        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().next().map(|key| key.tenant_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_token_to_tenant() {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("apikey_ns", &database)
            .await
            .expect("in-memory surrealdb");
        db.ensure_schema().await.expect("schema");

        let tenant = TenantContext::new("acme").expect("tenant");
        let key = ApiKey::new(&tenant, "secret-token", "ci key");
        db.store_tenant_item(&tenant, key).await.expect("store");

        let resolved = ApiKey::resolve_tenant(&db, "secret-token")
            .await
            .expect("resolve");
        assert_eq!(resolved.as_deref(), Some("acme"));

        let unknown = ApiKey::resolve_tenant(&db, "wrong-token")
            .await
            .expect("resolve");
        assert!(unknown.is_none());
    }
}
