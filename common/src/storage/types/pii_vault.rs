use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PiiType {
    Email,
    Phone,
    Ssn,
    Person,
}

impl PiiType {
    pub fn token_label(&self) -> &'static str {
        match self {
            PiiType::Email => "email",
            PiiType::Phone => "phone",
            PiiType::Ssn => "ssn",
            PiiType::Person => "person",
        }
    }
}

stored_object!(PiiVaultEntry, "pii_vault", {
    token: String,
    pii_type: PiiType,
    ciphertext: String
});

impl PiiVaultEntry {
    /// `ciphertext` is the base64 `nonce ‖ ct ‖ tag` blob from the vault
    /// crypto helpers.
    pub fn new(token: impl Into<String>, pii_type: PiiType, ciphertext: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            token: token.into(),
            pii_type,
            ciphertext: ciphertext.into(),
        }
    }

    pub async fn find_by_token(
        db: &SurrealDbClient,
        token: &str,
    ) -> Result<Option<Self>, AppError> {
        let mut response = db
            .client
            .query("SELECT * FROM pii_vault WHERE token = $token LIMIT 1")
            .bind(("token", token.to_owned()))
            .await?;
        let rows: Vec<Self> = response.take(0)?;
        Ok(rows.into_iter().next())
    }
}
