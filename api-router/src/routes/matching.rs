use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use common::storage::types::match_feedback::FeedbackOutcome;
use common::storage::TenantContext;
use matching_engine::engine::MatchOptions;
use matching_engine::feedback::{submit_feedback, FeedbackInput};

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct MatchRequestBody {
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub enable_llm_rerank: Option<bool>,
}

pub async fn match_requirement(
    State(state): State<ApiState>,
    Extension(tenant): Extension<TenantContext>,
    Path(params): Path<HashMap<String, String>>,
    body: Option<Json<MatchRequestBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let requirement_id = params
        .get("id")
        .ok_or_else(|| ApiError::ValidationError("missing requirement id".to_string()))?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let mut options = MatchOptions::default();
    if let Some(top_n) = body.top_n {
        if top_n == 0 {
            return Err(ApiError::ValidationError("top_n must be positive".to_string()));
        }
        options.top_n = top_n;
    }
    options.enable_llm_rerank = body.enable_llm_rerank;

    let ranked = state
        .matching
        .match_requirement(&tenant, requirement_id, options)
        .await?;

    let rows: Vec<_> = ranked
        .into_iter()
        .map(|m| {
            json!({
                "match_id": m.match_id,
                "consultant_id": m.consultant_id,
                "score": m.final_score,
                "linear_score": m.linear_score,
                "ltr_score": m.ltr_score,
                "llm_confidence": m.llm_confidence,
                "explanation": m.explanation,
            })
        })
        .collect();

    Ok(Json(json!({ "matches": rows })))
}

#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    pub outcome: FeedbackOutcome,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

pub async fn submit_match_feedback(
    State(state): State<ApiState>,
    Extension(tenant): Extension<TenantContext>,
    Path(params): Path<HashMap<String, String>>,
    Json(input): Json<FeedbackBody>,
) -> Result<impl IntoResponse, ApiError> {
    let match_id = params
        .get("id")
        .ok_or_else(|| ApiError::ValidationError("missing match id".to_string()))?;

    if let Some(rating) = input.rating {
        if !(1..=5).contains(&rating) {
            return Err(ApiError::ValidationError(
                "rating must be between 1 and 5".to_string(),
            ));
        }
    }

    let stored = submit_feedback(
        &state.db,
        &state.audit,
        &tenant,
        match_id,
        FeedbackInput {
            outcome: input.outcome,
            rating: input.rating,
            reason: input.reason,
            metadata: input.metadata,
        },
    )
    .await?;

    Ok(Json(json!({
        "feedback_id": stored.id,
        "match_id": stored.match_id,
    })))
}
