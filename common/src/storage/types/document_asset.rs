use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{storage::TenantContext, tenant_object};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentKind {
    Resume,
    RequirementAttachment,
}

tenant_object!(DocumentAsset, "document_asset", {
    kind: DocumentKind,
    file_name: String,
    content_type: String,
    size_bytes: u64,
    storage_key: String,
    consultant_id: Option<String>,
    requirement_id: Option<String>
});

impl DocumentAsset {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant: &TenantContext,
        id: impl Into<String>,
        kind: DocumentKind,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        size_bytes: u64,
        storage_key: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            tenant_id: tenant.tenant_id().to_string(),
            kind,
            file_name: file_name.into(),
            content_type: content_type.into(),
            size_bytes,
            storage_key: storage_key.into(),
            consultant_id: None,
            requirement_id: None,
        }
    }

    pub fn fresh_id() -> String {
        Uuid::new_v4().to_string()
    }
}
