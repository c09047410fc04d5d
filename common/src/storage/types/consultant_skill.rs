use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

tenant_object!(ConsultantSkill, "consultant_skill", {
    consultant_id: String,
    skill_id: String,
    weight: u32
});

impl ConsultantSkill {
    /// Weight is clamped into the 0..=100 edge range.
    pub fn new(
        tenant: &TenantContext,
        consultant_id: impl Into<String>,
        skill_id: impl Into<String>,
        weight: u32,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            consultant_id: consultant_id.into(),
            skill_id: skill_id.into(),
            weight: weight.min(100),
        }
    }

    pub async fn for_consultant(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        consultant_id: &str,
    ) -> Result<Vec<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM consultant_skill
                 WHERE tenant_id = $tenant AND consultant_id = $consultant",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("consultant", consultant_id.to_owned()))
            .await?;
        Ok(response.take(0)?)
    }

    /// skill_id -> weight map used by feature extraction.
    pub async fn weights_for_consultant(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        consultant_id: &str,
    ) -> Result<HashMap<String, u32>, AppError> {
        Ok(Self::for_consultant(db, tenant, consultant_id)
            .await?
            .into_iter()
            .map(|edge| (edge.skill_id, edge.weight))
            .collect())
    }

    /// Replace the consultant's full skill edge set.
    pub async fn replace_for_consultant(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        consultant_id: &str,
        skills: &[(String, u32)],
    ) -> Result<(), AppError> {
        db.client
            .query(
                "DELETE consultant_skill
                 WHERE tenant_id = $tenant AND consultant_id = $consultant",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("consultant", consultant_id.to_owned()))
            .await?
            .check()?;

        for (skill_id, weight) in skills {
            let edge = Self::new(tenant, consultant_id, skill_id.clone(), *weight);
            db.store_tenant_item(tenant, edge).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_swaps_edge_set() {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("cskill_ns", &database)
            .await
            .expect("in-memory surrealdb");
        db.ensure_schema().await.expect("schema");
        let tenant = TenantContext::new("acme").expect("tenant");

        ConsultantSkill::replace_for_consultant(
            &db,
            &tenant,
            "c1",
            &[("ts".to_string(), 60), ("react".to_string(), 40)],
        )
        .await
        .expect("replace");

        let weights = ConsultantSkill::weights_for_consultant(&db, &tenant, "c1")
            .await
            .expect("weights");
        assert_eq!(weights.get("ts"), Some(&60));
        assert_eq!(weights.len(), 2);

        ConsultantSkill::replace_for_consultant(&db, &tenant, "c1", &[("rust".to_string(), 90)])
            .await
            .expect("replace again");
        let weights = ConsultantSkill::weights_for_consultant(&db, &tenant, "c1")
            .await
            .expect("weights");
        assert_eq!(weights.len(), 1);
        assert_eq!(weights.get("rust"), Some(&90));
    }

    #[test]
    fn weight_is_clamped() {
        let tenant = TenantContext::new("acme").expect("tenant");
        let edge = ConsultantSkill::new(&tenant, "c1", "s1", 250);
        assert_eq!(edge.weight, 100);
    }
}
