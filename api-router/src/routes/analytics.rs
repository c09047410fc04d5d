use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde_json::json;

use common::queue::{REQUIREMENT_INGESTION, RESUME_INGESTION};
use common::storage::types::consultant::Consultant;
use common::storage::types::identity_signature::IdentitySignature;
use common::storage::types::match_record::MatchRecord;
use common::storage::types::queue_job::QueueJob;
use common::storage::types::requirement::Requirement;
use common::storage::TenantContext;

use crate::{api_state::ApiState, error::ApiError};

/// Operational summary: entity counts, queue depths and duplicate
/// candidates surfaced by the identity signatures.
pub async fn summary(
    State(state): State<ApiState>,
    Extension(tenant): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let consultants = state.db.count_tenant_items::<Consultant>(&tenant).await?;
    let requirements = state.db.count_tenant_items::<Requirement>(&tenant).await?;
    let matches = state.db.count_tenant_items::<MatchRecord>(&tenant).await?;

    let duplicates = IdentitySignature::duplicate_candidates(&state.db, &tenant).await?;

    let resume_pending = QueueJob::pending_count(&state.db, RESUME_INGESTION).await?;
    let resume_dead = QueueJob::dead_count(&state.db, RESUME_INGESTION).await?;
    let requirement_pending = QueueJob::pending_count(&state.db, REQUIREMENT_INGESTION).await?;
    let requirement_dead = QueueJob::dead_count(&state.db, REQUIREMENT_INGESTION).await?;

    Ok(Json(json!({
        "counts": {
            "consultants": consultants,
            "requirements": requirements,
            "matches": matches,
        },
        "duplicate_candidates": {
            "pending_clusters": duplicates.pending_clusters,
            "clusters": duplicates.clusters,
        },
        "queues": {
            "resume.ingestion": {"pending": resume_pending, "dead": resume_dead},
            "requirement.ingestion": {"pending": requirement_pending, "dead": requirement_dead},
        },
    })))
}
