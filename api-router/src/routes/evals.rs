use axum::{extract::State, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use common::storage::types::analytics_snapshot::{AnalyticsSnapshot, RankingMetrics};
use common::storage::TenantContext;
use matching_engine::evaluation::{evaluate, EvaluationOptions, EvaluationWindow};

use crate::{api_state::ApiState, error::ApiError};

/// Latest persisted evaluation snapshot for the tenant.
pub async fn latest_metrics(
    State(state): State<ApiState>,
    Extension(tenant): Extension<TenantContext>,
) -> Result<impl IntoResponse, ApiError> {
    let mut snapshots: Vec<AnalyticsSnapshot> = state.db.list_tenant_items(&tenant).await?;
    snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    match snapshots.into_iter().next() {
        Some(snapshot) => Ok(Json(json!({
            "window_start": snapshot.window_start.to_rfc3339(),
            "window_end": snapshot.window_end.to_rfc3339(),
            "offline": snapshot.offline,
            "online": snapshot.online,
            "baseline_delta": snapshot.baseline_delta,
            "human_review": snapshot.human_review,
        }))),
        None => Err(ApiError::NotFound("no evaluation snapshots yet".to_string())),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RunEvaluationBody {
    #[serde(default)]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub window_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub baseline: Option<RankingMetrics>,
    #[serde(default)]
    pub human_review: Option<String>,
}

/// Run a retrieval/ranking evaluation over the requested window (defaults
/// to the trailing 7 days) and persist the snapshot.
pub async fn run_evaluation(
    State(state): State<ApiState>,
    Extension(tenant): Extension<TenantContext>,
    body: Option<Json<RunEvaluationBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let window_end = body.window_end.unwrap_or_else(Utc::now);
    let window_start = body.window_start.unwrap_or(window_end - Duration::days(7));
    if window_start >= window_end {
        return Err(ApiError::ValidationError(
            "window_start must precede window_end".to_string(),
        ));
    }

    let options = EvaluationOptions {
        k: body.k.unwrap_or(state.config.eval_ndcg_k),
        relevance_threshold: state.config.eval_relevance_threshold,
        online_window_hours: state.config.eval_online_window_hours,
        baseline: body.baseline,
        human_review: body.human_review,
    };

    let snapshot = evaluate(
        &state.db,
        &tenant,
        EvaluationWindow {
            start: window_start,
            end: window_end,
        },
        options,
    )
    .await?;

    Ok(Json(json!({
        "snapshot_id": snapshot.id,
        "offline": snapshot.offline,
        "online": snapshot.online,
        "baseline_delta": snapshot.baseline_delta,
    })))
}
