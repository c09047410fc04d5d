use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde::Deserialize;
use serde_json::json;

use common::storage::types::search_document::SearchEntityType;
use common::storage::TenantContext;
use search_index::{HybridSearchRequest, SearchFilters};

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct SearchFiltersRequest {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub max_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct HybridSearchBody {
    pub query: String,
    #[serde(default)]
    pub entity_types: Option<Vec<SearchEntityType>>,
    #[serde(default)]
    pub filters: Option<SearchFiltersRequest>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn hybrid_search(
    State(state): State<ApiState>,
    Extension(tenant): Extension<TenantContext>,
    Json(input): Json<HybridSearchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let results = state
        .search
        .hybrid_search(
            &tenant,
            HybridSearchRequest {
                query: input.query,
                entity_types: input.entity_types,
                filters: input.filters.map(|f| SearchFilters {
                    location: f.location,
                    skills: f.skills,
                    max_rate: f.max_rate,
                }),
                limit: input.limit,
            },
        )
        .await?;

    let rows: Vec<_> = results
        .into_iter()
        .map(|result| {
            json!({
                "entity_type": format!("{:?}", result.entity_type),
                "entity_id": result.entity_id,
                "metadata": result.metadata,
                "vector_score": result.vector_score,
                "lexical_score": result.lexical_score,
                "total_score": result.total_score,
            })
        })
        .collect();

    Ok(Json(json!({ "results": rows })))
}
