use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(Skill, "skill", {
    name: String,
    category: Option<String>,
    ontology_node_id: Option<String>
});

impl Skill {
    pub fn new(name: impl Into<String>, category: Option<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            name: name.into(),
            category,
            ontology_node_id: None,
        }
    }

    /// Case-insensitive lookup by canonical name.
    pub async fn find_by_name_ci(
        db: &SurrealDbClient,
        name: &str,
    ) -> Result<Option<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM skill
                 WHERE string::lowercase(name) = string::lowercase($name)
                 LIMIT 1",
            )
            .bind(("name", name.to_owned()))
            .await?;
        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Resolve an existing skill by name or create a new canonical one.
    pub async fn get_or_create(db: &SurrealDbClient, name: &str) -> Result<Self, AppError> {
        if let Some(existing) = Self::find_by_name_ci(db, name).await? {
            return Ok(existing);
        }
        let skill = Self::new(name.trim(), None);
        db.store_item(skill.clone()).await?;
        Ok(skill)
    }

    /// Attach this skill to a node of the active ontology version.
    pub async fn link_to_node(
        db: &SurrealDbClient,
        skill_id: &str,
        node_id: &str,
    ) -> Result<(), AppError> {
        db.client
            .query("UPDATE type::thing('skill', $id) SET ontology_node_id = $node, updated_at = time::now()")
            .bind(("id", skill_id.to_owned()))
            .bind(("node", node_id.to_owned()))
            .await?
            .check()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn memory_db() -> SurrealDbClient {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("skill_ns", &database)
            .await
            .expect("in-memory surrealdb");
        db.ensure_schema().await.expect("schema");
        db
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let db = memory_db().await;
        db.store_item(Skill::new("TypeScript", None))
            .await
            .expect("store");

        let found = Skill::find_by_name_ci(&db, "typescript")
            .await
            .expect("query");
        assert_eq!(found.map(|s| s.name), Some("TypeScript".to_string()));
    }

    #[tokio::test]
    async fn get_or_create_reuses_existing() {
        let db = memory_db().await;
        let first = Skill::get_or_create(&db, "React").await.expect("create");
        let second = Skill::get_or_create(&db, "react").await.expect("reuse");
        assert_eq!(first.id, second.id);
    }
}
