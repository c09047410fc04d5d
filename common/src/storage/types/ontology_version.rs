use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(OntologyVersion, "ontology_version", {
    version: String,
    source: String,
    is_active: bool,
    #[serde(
        serialize_with = "crate::storage::types::serialize_option_datetime",
        deserialize_with = "crate::storage::types::deserialize_option_datetime",
        default
    )]
    published_at: Option<chrono::DateTime<chrono::Utc>>
});

impl OntologyVersion {
    pub fn new(version: impl Into<String>, source: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            version: version.into(),
            source: source.into(),
            is_active: false,
            published_at: None,
        }
    }

    /// The single active version, if one has been published.
    pub async fn active(db: &SurrealDbClient) -> Result<Option<Self>, AppError> {
        let mut response = db
            .client
            .query("SELECT * FROM ontology_version WHERE is_active = true LIMIT 1")
            .await?;
        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Activate one version and deactivate all others, atomically.
    pub async fn activate(db: &SurrealDbClient, version_id: &str) -> Result<(), AppError> {
        let mut response = db
            .client
            .query(
                "BEGIN TRANSACTION;
                 UPDATE ontology_version SET is_active = false WHERE is_active = true;
                 UPDATE type::thing('ontology_version', $id)
                     SET is_active = true, published_at = time::now(), updated_at = time::now();
                 COMMIT TRANSACTION;",
            )
            .bind(("id", version_id.to_owned()))
            .await?;
        let activated: Vec<Self> = response.take(1)?;
        if activated.is_empty() {
            return Err(AppError::NotFound(format!(
                "ontology version {version_id}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::StoredObject;
    use uuid::Uuid;

    #[tokio::test]
    async fn activation_is_exclusive() {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("ontology_ns", &database)
            .await
            .expect("in-memory surrealdb");

        let v1 = OntologyVersion::new("2024.1", "esco");
        let v2 = OntologyVersion::new("2024.2", "esco");
        db.store_item(v1.clone()).await.expect("store v1");
        db.store_item(v2.clone()).await.expect("store v2");

        OntologyVersion::activate(&db, &v1.id).await.expect("activate v1");
        assert_eq!(
            OntologyVersion::active(&db).await.expect("active").map(|v| v.id),
            Some(v1.id.clone())
        );

        OntologyVersion::activate(&db, &v2.id).await.expect("activate v2");
        let all: Vec<OntologyVersion> = db
            .get_all_stored_items()
            .await
            .expect("list");
        let active: Vec<_> = all.iter().filter(|v| v.is_active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, v2.id);
        assert_eq!(OntologyVersion::table_name(), "ontology_version");
    }
}
