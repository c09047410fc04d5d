use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use common::error::AppError;
use common::storage::types::search_document::SearchEntityType;
use common::storage::TenantContext;

use crate::scoring::{distance_to_similarity, fuse_scores, min_max_normalize, sort_by_score_desc, Scores};
use crate::SearchIndex;

const HARD_RESULT_CAP: usize = 100;
const KNN_EF: usize = 40;

/// Structural filters applied as hard predicates before ranking.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Case-insensitive substring match on metadata.location.
    pub location: Option<String>,
    /// Every listed skill must be present in metadata.skills.
    pub skills: Vec<String>,
    /// Upper rate bound against metadata.rate_range / metadata.rate.
    pub max_rate: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct HybridSearchRequest {
    pub query: String,
    pub entity_types: Option<Vec<SearchEntityType>>,
    pub filters: Option<SearchFilters>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct HybridSearchResult {
    pub entity_type: SearchEntityType,
    pub entity_id: String,
    pub content: String,
    pub metadata: Value,
    pub vector_score: f32,
    pub lexical_score: f32,
    pub total_score: f32,
}

#[derive(Debug, Deserialize)]
struct VectorRow {
    entity_type: SearchEntityType,
    entity_id: String,
    content: String,
    metadata: Value,
    distance: f32,
}

#[derive(Debug, Deserialize)]
struct LexicalRow {
    entity_type: SearchEntityType,
    entity_id: String,
    content: String,
    metadata: Value,
    fts_score: Option<f32>,
}

struct Candidate {
    entity_type: SearchEntityType,
    entity_id: String,
    content: String,
    metadata: Value,
    scores: Scores,
}

impl SearchIndex {
    /// Weighted hybrid query over the tenant's search documents.
    ///
    /// `total = wV · vector + wL · lexical`; the vector side is zero when
    /// the embedder is disabled, the lexical side is zero for an empty
    /// query. When both sides are zero every returned row ties at zero and
    /// ordering between ties carries no meaning.
    pub async fn hybrid_search(
        &self,
        tenant: &TenantContext,
        request: HybridSearchRequest,
    ) -> Result<Vec<HybridSearchResult>, AppError> {
        let limit = request
            .limit
            .unwrap_or(self.max_results)
            .min(HARD_RESULT_CAP)
            .max(1);
        let pool = (limit * 3).max(30);

        let mut candidates: HashMap<(SearchEntityType, String), Candidate> = HashMap::new();

        let query_text = request.query.trim();
        if self.embedder().is_enabled() && !query_text.is_empty() {
            for row in self
                .vector_candidates(tenant, query_text, request.entity_types.as_deref(), pool)
                .await?
            {
                let key = (row.entity_type, row.entity_id.clone());
                let vector_score = distance_to_similarity(row.distance);
                candidates
                    .entry(key)
                    .and_modify(|c| c.scores.vector = Some(vector_score))
                    .or_insert(Candidate {
                        entity_type: row.entity_type,
                        entity_id: row.entity_id,
                        content: row.content,
                        metadata: row.metadata,
                        scores: Scores {
                            vector: Some(vector_score),
                            lexical: None,
                        },
                    });
            }
        }

        if !query_text.is_empty() {
            let rows = self
                .lexical_candidates(tenant, query_text, request.entity_types.as_deref(), pool)
                .await?;
            let normalized =
                min_max_normalize(&rows.iter().map(|r| r.fts_score.unwrap_or(0.0)).collect::<Vec<_>>());
            for (row, lexical_score) in rows.into_iter().zip(normalized) {
                let key = (row.entity_type, row.entity_id.clone());
                candidates
                    .entry(key)
                    .and_modify(|c| c.scores.lexical = Some(lexical_score))
                    .or_insert(Candidate {
                        entity_type: row.entity_type,
                        entity_id: row.entity_id,
                        content: row.content,
                        metadata: row.metadata,
                        scores: Scores {
                            vector: None,
                            lexical: Some(lexical_score),
                        },
                    });
            }
        } else {
            // Empty query: a filtered scan with all-zero scores.
            for row in self
                .unscored_candidates(tenant, request.entity_types.as_deref(), pool)
                .await?
            {
                let key = (row.entity_type, row.entity_id.clone());
                candidates.entry(key).or_insert(Candidate {
                    entity_type: row.entity_type,
                    entity_id: row.entity_id,
                    content: row.content,
                    metadata: row.metadata,
                    scores: Scores::default(),
                });
            }
        }

        let filters = request.filters.unwrap_or_default();
        let mut results: Vec<HybridSearchResult> = candidates
            .into_values()
            .filter(|candidate| passes_filters(&candidate.metadata, &filters))
            .map(|candidate| {
                let total_score =
                    fuse_scores(&candidate.scores, self.vector_weight, self.lexical_weight);
                HybridSearchResult {
                    entity_type: candidate.entity_type,
                    entity_id: candidate.entity_id,
                    content: candidate.content,
                    metadata: candidate.metadata,
                    vector_score: candidate.scores.vector.unwrap_or(0.0),
                    lexical_score: candidate.scores.lexical.unwrap_or(0.0),
                    total_score,
                }
            })
            .collect();

        sort_by_score_desc(
            &mut results,
            |r| r.total_score,
            |r| r.entity_id.clone(),
        );
        results.truncate(limit);

        debug!(
            tenant = tenant.tenant_id(),
            query = query_text,
            results = results.len(),
            "hybrid search completed"
        );
        Ok(results)
    }

    async fn vector_candidates(
        &self,
        tenant: &TenantContext,
        query: &str,
        entity_types: Option<&[SearchEntityType]>,
        pool: usize,
    ) -> Result<Vec<VectorRow>, AppError> {
        let embedding = self.embedder().embed_or_zero(query).await;
        if embedding.iter().all(|v| *v == 0.0) {
            return Ok(Vec::new());
        }

        let type_clause = entity_types
            .map(|_| " AND entity_type IN $entity_types")
            .unwrap_or_default();
        let sql = format!(
            "SELECT entity_type, entity_id, content, metadata, vector::distance::knn() AS distance
             FROM search_document
             WHERE tenant_id = $tenant{type_clause} AND embedding <|{pool},{KNN_EF}|> $embedding
             ORDER BY distance ASC"
        );

        let mut query = self
            .db()
            .client
            .query(sql)
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("embedding", embedding));
        if let Some(types) = entity_types {
            query = query.bind(("entity_types", types.to_vec()));
        }
        let mut response = query.await?;
        Ok(response.take(0)?)
    }

    async fn lexical_candidates(
        &self,
        tenant: &TenantContext,
        query_text: &str,
        entity_types: Option<&[SearchEntityType]>,
        pool: usize,
    ) -> Result<Vec<LexicalRow>, AppError> {
        let type_clause = entity_types
            .map(|_| " AND entity_type IN $entity_types")
            .unwrap_or_default();
        let sql = format!(
            "SELECT entity_type, entity_id, content, metadata,
                    (IF search::score(0) != NONE THEN search::score(0) ELSE 0 END) AS fts_score
             FROM search_document
             WHERE content @0@ $terms AND tenant_id = $tenant{type_clause}
             ORDER BY fts_score DESC
             LIMIT $limit"
        );

        let mut query = self
            .db()
            .client
            .query(sql)
            .bind(("terms", query_text.to_owned()))
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("limit", pool as i64));
        if let Some(types) = entity_types {
            query = query.bind(("entity_types", types.to_vec()));
        }
        let mut response = query.await?;
        Ok(response.take(0)?)
    }

    async fn unscored_candidates(
        &self,
        tenant: &TenantContext,
        entity_types: Option<&[SearchEntityType]>,
        pool: usize,
    ) -> Result<Vec<LexicalRow>, AppError> {
        let type_clause = entity_types
            .map(|_| " AND entity_type IN $entity_types")
            .unwrap_or_default();
        let sql = format!(
            "SELECT entity_type, entity_id, content, metadata, 0.0 AS fts_score
             FROM search_document
             WHERE tenant_id = $tenant{type_clause}
             LIMIT $limit"
        );

        let mut query = self
            .db()
            .client
            .query(sql)
            .bind(("tenant", tenant.tenant_id().to_owned()))
            .bind(("limit", pool as i64));
        if let Some(types) = entity_types {
            query = query.bind(("entity_types", types.to_vec()));
        }
        let mut response = query.await?;
        Ok(response.take(0)?)
    }
}

fn passes_filters(metadata: &Value, filters: &SearchFilters) -> bool {
    if let Some(location) = &filters.location {
        let candidate_location = metadata
            .get("location")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !candidate_location
            .to_lowercase()
            .contains(&location.to_lowercase())
        {
            return false;
        }
    }

    if !filters.skills.is_empty() {
        let candidate_skills: Vec<String> = metadata
            .get("skills")
            .and_then(Value::as_array)
            .map(|skills| {
                skills
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default();
        for wanted in &filters.skills {
            if !candidate_skills.contains(&wanted.to_lowercase()) {
                return false;
            }
        }
    }

    if let Some(max_rate) = filters.max_rate {
        // Requirements carry a rate range; consultants a single rate. A
        // document without rate information is not excluded.
        if let Some(range) = metadata.get("rate_range").and_then(Value::as_array) {
            if let Some(upper) = range.get(1).and_then(Value::as_f64) {
                if upper > max_rate {
                    return false;
                }
            }
        } else if let Some(rate) = metadata.get("rate").and_then(Value::as_f64) {
            if rate > max_rate {
                return false;
            }
        }
    }

    true
}
