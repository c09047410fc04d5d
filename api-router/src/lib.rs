#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

//! Thin tenant-scoped HTTP surface over the core: ingestion intake, hybrid
//! search, matching, feedback, analytics and evaluation routes, plus the
//! public health probes. Auth resolves bearer credentials to the path
//! tenant; rate limiting gates the edge before any work is accepted.

use api_state::ApiState;
use axum::{
    extract::FromRef,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use middleware_api_auth::api_auth;
use routes::{
    analytics::summary,
    documents::{create_upload_url, list_documents},
    evals::{latest_metrics, run_evaluation},
    ingestion::{ingest_requirement, ingest_resume},
    liveness::live,
    matching::{match_requirement, submit_match_feedback},
    readiness::ready,
    search::hybrid_search,
};

pub mod api_state;
pub mod error;
mod middleware_api_auth;
mod routes;

/// Full API router: public health probes plus the authenticated
/// tenant-scoped surface.
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Public, unauthenticated endpoints (for k8s/systemd probes)
    let public = Router::new()
        .route("/health", get(live))
        .route("/health/liveness", get(live))
        .route("/health/readiness", get(ready));

    // Tenant-scoped endpoints behind bearer auth + rate limiting
    let protected = Router::new()
        .route("/tenants/{tenant_id}/ingestion/resumes", post(ingest_resume))
        .route(
            "/tenants/{tenant_id}/ingestion/requirements",
            post(ingest_requirement),
        )
        .route("/tenants/{tenant_id}/documents", get(list_documents))
        .route(
            "/tenants/{tenant_id}/documents/upload-url",
            post(create_upload_url),
        )
        .route("/tenants/{tenant_id}/search/hybrid", post(hybrid_search))
        .route(
            "/tenants/{tenant_id}/matching/requirements/{id}",
            post(match_requirement),
        )
        .route(
            "/tenants/{tenant_id}/matching/matches/{id}/feedback",
            post(submit_match_feedback),
        )
        .route("/tenants/{tenant_id}/analytics/summary", get(summary))
        .route("/tenants/{tenant_id}/evals/metrics", get(latest_metrics))
        .route("/tenants/{tenant_id}/evals/retrieval", post(run_evaluation))
        .route_layer(from_fn_with_state(app_state.clone(), api_auth));

    public.merge(protected)
}
