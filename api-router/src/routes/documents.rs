use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde::Deserialize;
use serde_json::json;

use common::storage::types::document_asset::DocumentAsset;
use common::storage::TenantContext;
use ingestion_pipeline::intake::sanitize_file_name;

use crate::{api_state::ApiState, error::ApiError};

pub async fn list_documents(
    State(state): State<ApiState>,
    Extension(tenant): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let documents: Vec<DocumentAsset> = state.db.list_tenant_items(&tenant).await?;
    let rows: Vec<_> = documents
        .into_iter()
        .map(|doc| {
            json!({
                "id": doc.id,
                "kind": format!("{:?}", doc.kind),
                "file_name": doc.file_name,
                "content_type": doc.content_type,
                "size_bytes": doc.size_bytes,
                "created_at": doc.created_at.to_rfc3339(),
            })
        })
        .collect();
    Ok(Json(json!({ "documents": rows })))
}

#[derive(Debug, Deserialize)]
pub struct UploadUrlRequest {
    pub file_name: String,
}

/// Presigned PUT for direct uploads. Only available on the S3 backend.
pub async fn create_upload_url(
    State(state): State<ApiState>,
    Extension(tenant): Extension<TenantContext>,
    Json(input): Json<UploadUrlRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if input.file_name.trim().is_empty() {
        return Err(ApiError::ValidationError("file_name is required".to_string()));
    }

    let document_id = DocumentAsset::fresh_id();
    let storage_key = format!(
        "tenants/{}/documents/{}/{}",
        tenant.tenant_id(),
        document_id,
        sanitize_file_name(&input.file_name)
    );
    let url = state.storage.signed_upload_url(&storage_key).await?;

    Ok(Json(json!({
        "document_id": document_id,
        "storage_key": storage_key,
        "upload_url": url,
        "expires_in_secs": state.config.signed_url_ttl_secs,
    })))
}
