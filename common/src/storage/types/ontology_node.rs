use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(OntologyNode, "ontology_node", {
    version_id: String,
    canonical_name: String,
    code: Option<String>,
    category: Option<String>,
    tags: Vec<String>
});

impl OntologyNode {
    pub fn new(version_id: impl Into<String>, canonical_name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            version_id: version_id.into(),
            canonical_name: canonical_name.into(),
            code: None,
            category: None,
            tags: Vec::new(),
        }
    }

    pub async fn list_for_version(
        db: &SurrealDbClient,
        version_id: &str,
    ) -> Result<Vec<Self>, AppError> {
        let mut response = db
            .client
            .query("SELECT * FROM ontology_node WHERE version_id = $version")
            .bind(("version", version_id.to_owned()))
            .await?;
        Ok(response.take(0)?)
    }
}
