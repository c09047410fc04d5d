use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, TenantContext},
    tenant_object,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    Email,
    Phone,
    NameLoc,
}

tenant_object!(IdentitySignature, "identity_signature", {
    consultant_id: String,
    kind: SignatureKind,
    value: String
});

/// Duplicate-consultant clusters derived from shared signatures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateCandidates {
    pub clusters: Vec<Vec<String>>,
    pub pending_clusters: usize,
}

impl IdentitySignature {
    pub fn new(
        tenant: &TenantContext,
        consultant_id: impl Into<String>,
        kind: SignatureKind,
        value: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            consultant_id: consultant_id.into(),
            kind,
            value: value.into(),
        }
    }

    /// Normalised signature set for a consultant. Empty components emit no
    /// signature.
    pub fn derive(
        tenant: &TenantContext,
        consultant_id: &str,
        email: Option<&str>,
        phone: Option<&str>,
        first_name: &str,
        last_name: &str,
        location: Option<&str>,
    ) -> Vec<Self> {
        let mut signatures = Vec::new();

        if let Some(email) = email {
            let value = email.trim().to_lowercase();
            if !value.is_empty() {
                signatures.push(Self::new(tenant, consultant_id, SignatureKind::Email, value));
            }
        }

        if let Some(phone) = phone {
            let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
            if !digits.is_empty() {
                signatures.push(Self::new(tenant, consultant_id, SignatureKind::Phone, digits));
            }
        }

        let name_loc = format!(
            "{}{}{}",
            first_name.trim().to_lowercase(),
            last_name.trim().to_lowercase(),
            location.map(|l| l.trim().to_lowercase()).unwrap_or_default()
        );
        if !name_loc.is_empty() {
            signatures.push(Self::new(
                tenant,
                consultant_id,
                SignatureKind::NameLoc,
                name_loc,
            ));
        }

        signatures
    }

    /// Drop and re-emit the consultant's signatures after a mutation.
    pub async fn replace_for_consultant(
        db: &SurrealDbClient,
        tenant: &TenantContext,
        consultant_id: &str,
        signatures: Vec<Self>,
    ) -> Result<(), AppError> {
        db.client
            .query(
                "DELETE identity_signature
                 WHERE tenant_id = $tenant AND consultant_id = $consultant",
            )
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("consultant", consultant_id.to_owned()))
            .await?
            .check()?;

        for signature in signatures {
            db.store_tenant_item(tenant, signature).await?;
        }
        Ok(())
    }

    /// Transitive closure over shared `(kind, value)` pairs: any two
    /// consultants sharing a non-empty signature land in one cluster.
    /// Singleton clusters are not duplicates and are dropped.
    pub async fn duplicate_candidates(
        db: &SurrealDbClient,
        tenant: &TenantContext,
    ) -> Result<DuplicateCandidates, AppError> {
        let signatures: Vec<Self> = db.list_tenant_items(tenant).await?;

        let mut parents: HashMap<String, String> = HashMap::new();

        fn find(parents: &mut HashMap<String, String>, id: &str) -> String {
            let parent = parents.get(id).cloned().unwrap_or_else(|| id.to_string());
            if parent == id {
                return parent;
            }
            let root = find(parents, &parent);
            parents.insert(id.to_string(), root.clone());
            root
        }

        fn union(parents: &mut HashMap<String, String>, a: &str, b: &str) {
            let root_a = find(parents, a);
            let root_b = find(parents, b);
            if root_a != root_b {
                parents.insert(root_b, root_a);
            }
        }

        let mut by_value: HashMap<(SignatureKind, String), Vec<String>> = HashMap::new();
        for signature in &signatures {
            parents
                .entry(signature.consultant_id.clone())
                .or_insert_with(|| signature.consultant_id.clone());
            by_value
                .entry((signature.kind, signature.value.clone()))
                .or_default()
                .push(signature.consultant_id.clone());
        }

        for members in by_value.values() {
            for pair in members.windows(2) {
                union(&mut parents, &pair[0], &pair[1]);
            }
        }

        let ids: Vec<String> = parents.keys().cloned().collect();
        let mut clusters: HashMap<String, Vec<String>> = HashMap::new();
        for id in ids {
            let root = find(&mut parents, &id);
            clusters.entry(root).or_default().push(id);
        }

        let mut clusters: Vec<Vec<String>> = clusters
            .into_values()
            .filter(|members| members.len() > 1)
            .collect();
        for cluster in &mut clusters {
            cluster.sort();
        }
        clusters.sort();

        Ok(DuplicateCandidates {
            pending_clusters: clusters.len(),
            clusters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantContext {
        TenantContext::new("acme").expect("tenant")
    }

    #[test]
    fn derive_normalises_components() {
        let tenant = tenant();
        let signatures = IdentitySignature::derive(
            &tenant,
            "c1",
            Some(" Jane.Doe@Acme.IO "),
            Some("(415) 555-0134"),
            "Jane",
            "Doe",
            Some("Austin, TX"),
        );

        assert_eq!(signatures.len(), 3);
        assert_eq!(signatures[0].value, "jane.doe@acme.io");
        assert_eq!(signatures[1].value, "4155550134");
        assert_eq!(signatures[2].value, "janedoeaustin, tx");
    }

    #[test]
    fn derive_skips_empty_components() {
        let tenant = tenant();
        let signatures = IdentitySignature::derive(&tenant, "c1", None, Some("n/a"), "", "", None);
        assert!(signatures.is_empty());
    }

    #[tokio::test]
    async fn clusters_are_transitive() {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("sig_ns", &database)
            .await
            .expect("in-memory surrealdb");
        db.ensure_schema().await.expect("schema");
        let tenant = tenant();

        // c1 and c2 share an email; c2 and c3 share a phone; c4 stands alone.
        let rows = vec![
            IdentitySignature::new(&tenant, "c1", SignatureKind::Email, "x@acme.io"),
            IdentitySignature::new(&tenant, "c2", SignatureKind::Email, "x@acme.io"),
            IdentitySignature::new(&tenant, "c2", SignatureKind::Phone, "4155550134"),
            IdentitySignature::new(&tenant, "c3", SignatureKind::Phone, "4155550134"),
            IdentitySignature::new(&tenant, "c4", SignatureKind::Email, "solo@acme.io"),
        ];
        for row in rows {
            db.store_tenant_item(&tenant, row).await.expect("store");
        }

        let candidates = IdentitySignature::duplicate_candidates(&db, &tenant)
            .await
            .expect("clusters");
        assert_eq!(candidates.pending_clusters, 1);
        assert_eq!(
            candidates.clusters,
            vec![vec!["c1".to_string(), "c2".to_string(), "c3".to_string()]]
        );
    }
}
