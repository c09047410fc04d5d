use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

tenant_object!(RequirementSkill, "requirement_skill", {
    requirement_id: String,
    skill_id: String,
    weight: u32
});

impl RequirementSkill {
    pub fn new(
        tenant: &TenantContext,
        requirement_id: impl Into<String>,
        skill_id: impl Into<String>,
        weight: u32,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            requirement_id: requirement_id.into(),
            skill_id: skill_id.into(),
            weight: weight.min(100),
        }
    }

    pub async fn for_requirement(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        requirement_id: &str,
    ) -> Result<Vec<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM requirement_skill
                 WHERE tenant_id = $tenant AND requirement_id = $requirement",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("requirement", requirement_id.to_owned()))
            .await?;
        Ok(response.take(0)?)
    }

    pub async fn weights_for_requirement(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        requirement_id: &str,
    ) -> Result<HashMap<String, u32>, AppError> {
        Ok(Self::for_requirement(db, tenant, requirement_id)
            .await?
            .into_iter()
            .map(|edge| (edge.skill_id, edge.weight))
            .collect())
    }

    pub async fn replace_for_requirement(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        requirement_id: &str,
        skills: &[(String, u32)],
    ) -> Result<(), AppError> {
        db.client
            .query(
                "DELETE requirement_skill
                 WHERE tenant_id = $tenant AND requirement_id = $requirement",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("requirement", requirement_id.to_owned()))
            .await?
            .check()?;

        for (skill_id, weight) in skills {
            let edge = Self::new(tenant, requirement_id, skill_id.clone(), *weight);
            db.store_tenant_item(tenant, edge).await?;
        }
        Ok(())
    }
}
