use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AliasMatchType {
    Exact,
    Synonym,
    Abbreviation,
}

stored_object!(OntologyAlias, "ontology_alias", {
    node_id: String,
    value: String,
    locale: Option<String>,
    match_type: AliasMatchType,
    confidence: Option<f32>
});

impl OntologyAlias {
    /// Alias values are stored lowercased so lookups are a plain equality.
    pub fn new(node_id: impl Into<String>, value: &str, match_type: AliasMatchType) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            node_id: node_id.into(),
            value: value.to_lowercase(),
            locale: None,
            match_type,
            confidence: None,
        }
    }

    /// All aliases belonging to nodes of the given ontology version.
    pub async fn list_for_version(
        db: &SurrealDbClient,
        version_id: &str,
    ) -> Result<Vec<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM ontology_alias
                 WHERE node_id IN (SELECT VALUE record::id(id) FROM ontology_node WHERE version_id = $version)",
            )
            .bind(("version", version_id.to_owned()))
            .await?;
        Ok(response.take(0)?)
    }
}
