use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use common::storage::TenantContext;
use ingestion_pipeline::ResumeUpload;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ResumeUploadRequest {
    pub file_name: String,
    pub content_type: String,
    /// Base64-encoded document bytes.
    pub data: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub consultant_id: Option<String>,
    #[serde(default)]
    pub requirement_id: Option<String>,
}

fn default_source() -> String {
    "api".to_string()
}

pub async fn ingest_resume(
    State(state): State<ApiState>,
    Extension(tenant): Extension<TenantContext>,
    Json(input): Json<ResumeUploadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if input.file_name.trim().is_empty() {
        return Err(ApiError::ValidationError("file_name is required".to_string()));
    }
    let bytes = BASE64
        .decode(input.data.as_bytes())
        .map_err(|_| ApiError::ValidationError("data is not valid base64".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::ValidationError("document is empty".to_string()));
    }

    let outcome = state
        .ingestion
        .ingest_resume(
            &tenant,
            ResumeUpload {
                file_name: input.file_name,
                content_type: input.content_type,
                bytes: Bytes::from(bytes),
                source: input.source,
                consultant_id: input.consultant_id,
                requirement_id: input.requirement_id,
            },
        )
        .await?;

    info!(
        tenant = tenant.tenant_id(),
        document_id = %outcome.document_id,
        duplicate = outcome.duplicate,
        "resume accepted"
    );
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "document_id": outcome.document_id,
            "duplicate": outcome.duplicate,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct RequirementIngestRequest {
    pub content: String,
    #[serde(default = "default_source")]
    pub source: String,
}

pub async fn ingest_requirement(
    State(state): State<ApiState>,
    Extension(tenant): Extension<TenantContext>,
    Json(input): Json<RequirementIngestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if input.content.trim().is_empty() {
        return Err(ApiError::ValidationError("content is required".to_string()));
    }

    let outcome = state
        .ingestion
        .ingest_requirement(&tenant, &input.source, &input.content)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "ingestion_id": outcome.ingestion_id,
            "duplicate": outcome.duplicate,
        })),
    ))
}
