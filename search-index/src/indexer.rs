use std::collections::HashMap;

use tracing::{debug, info};

use common::error::AppError;
use common::storage::types::consultant::Consultant;
use common::storage::types::consultant_skill::ConsultantSkill;
use common::storage::types::requirement::Requirement;
use common::storage::types::requirement_skill::RequirementSkill;
use common::storage::types::search_document::{SearchDocument, SearchEntityType};
use common::storage::types::skill::Skill;
use common::storage::TenantContext;
use common::utils::embedding::fit_dimension;

use crate::content::{assemble_consultant, assemble_requirement};
use crate::SearchIndex;

impl SearchIndex {
    /// Refresh the search document for one consultant. Called after every
    /// mutation of the entity.
    pub async fn index_consultant(
        &self,
        tenant: &TenantContext,
        consultant_id: &str,
    ) -> Result<(), AppError> {
        let Some(consultant): Option<Consultant> =
            self.db().get_tenant_item(tenant, consultant_id).await?
        else {
            return Err(AppError::NotFound(format!("consultant {consultant_id}")));
        };

        let skill_names = self
            .skill_names_for(
                ConsultantSkill::for_consultant(self.db(), tenant, consultant_id)
                    .await?
                    .into_iter()
                    .map(|edge| edge.skill_id),
            )
            .await?;

        let assembled = assemble_consultant(&consultant, &skill_names);
        self.write_document(
            tenant,
            SearchEntityType::Consultant,
            consultant_id,
            assembled.content,
            assembled.metadata,
        )
        .await
    }

    /// Refresh the search document for one requirement.
    pub async fn index_requirement(
        &self,
        tenant: &TenantContext,
        requirement_id: &str,
    ) -> Result<(), AppError> {
        let Some(requirement): Option<Requirement> =
            self.db().get_tenant_item(tenant, requirement_id).await?
        else {
            return Err(AppError::NotFound(format!("requirement {requirement_id}")));
        };

        let skill_names = self
            .skill_names_for(
                RequirementSkill::for_requirement(self.db(), tenant, requirement_id)
                    .await?
                    .into_iter()
                    .map(|edge| edge.skill_id),
            )
            .await?;

        let assembled = assemble_requirement(&requirement, &skill_names);
        self.write_document(
            tenant,
            SearchEntityType::Requirement,
            requirement_id,
            assembled.content,
            assembled.metadata,
        )
        .await
    }

    /// Re-index every entity of the requested type for the tenant.
    pub async fn reindex_all(
        &self,
        tenant: &TenantContext,
        entity_type: SearchEntityType,
    ) -> Result<usize, AppError> {
        let count = match entity_type {
            SearchEntityType::Consultant => {
                let consultants: Vec<Consultant> = self.db().list_tenant_items(tenant).await?;
                for consultant in &consultants {
                    self.index_consultant(tenant, &consultant.id).await?;
                }
                consultants.len()
            }
            SearchEntityType::Requirement => {
                let requirements: Vec<Requirement> = self.db().list_tenant_items(tenant).await?;
                for requirement in &requirements {
                    self.index_requirement(tenant, &requirement.id).await?;
                }
                requirements.len()
            }
        };

        info!(
            tenant = tenant.tenant_id(),
            ?entity_type,
            count,
            "bulk reindex finished"
        );
        Ok(count)
    }

    pub async fn remove_entity(
        &self,
        tenant: &TenantContext,
        entity_type: SearchEntityType,
        entity_id: &str,
    ) -> Result<(), AppError> {
        SearchDocument::remove(self.db(), tenant, entity_type, entity_id).await
    }

    async fn write_document(
        &self,
        tenant: &TenantContext,
        entity_type: SearchEntityType,
        entity_id: &str,
        content: String,
        metadata: serde_json::Value,
    ) -> Result<(), AppError> {
        // Embedder failure or absence degrades to the zero vector; the
        // document stays lexically searchable either way.
        let embedding = self.embedder().embed_or_zero(&content).await;
        let embedding = fit_dimension(embedding, self.embedder().dimension());

        let document =
            SearchDocument::new(tenant, entity_type, entity_id, content, metadata, embedding);
        SearchDocument::upsert(self.db(), tenant, document).await?;
        debug!(
            tenant = tenant.tenant_id(),
            ?entity_type,
            entity_id,
            "search document refreshed"
        );
        Ok(())
    }

    async fn skill_names_for(
        &self,
        skill_ids: impl Iterator<Item = String>,
    ) -> Result<Vec<String>, AppError> {
        let skills: Vec<Skill> = self.db().get_all_stored_items().await?;
        let by_id: HashMap<String, String> = skills
            .into_iter()
            .map(|skill| (skill.id.clone(), skill.name))
            .collect();

        Ok(skill_ids
            .filter_map(|id| by_id.get(&id).cloned())
            .collect())
    }
}
