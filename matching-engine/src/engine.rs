use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use serde_json::json;
use tracing::{debug, info, warn};

use common::audit::{AuditEvent, AuditRecorder};
use common::error::AppError;
use common::storage::db::SurrealDbClient;
use common::storage::types::consultant::Consultant;
use common::storage::types::consultant_skill::ConsultantSkill;
use common::storage::types::match_feature_snapshot::MatchFeatureSnapshot;
use common::storage::types::match_record::MatchRecord;
use common::storage::types::requirement::Requirement;
use common::storage::types::requirement_skill::RequirementSkill;
use common::storage::types::search_document::SearchEntityType;
use common::storage::types::skill::Skill;
use common::storage::TenantContext;
use common::utils::config::AppConfig;
use search_index::{HybridSearchRequest, SearchFilters, SearchIndex};

use crate::explanation::build_explanation;
use crate::features::FeatureVector;
use crate::filters::apply_hard_filters;
use crate::linear::linear_score;
use crate::ltr::MODEL_V1;
use crate::summary::{MatchSummariser, MatchSummary, MatchSummaryFacts};
use crate::MODEL_VERSION;

const DEFAULT_TOP_N: usize = 10;
const MIN_RETRIEVAL_POOL: usize = 25;
const LINEAR_BLEND_WEIGHT: f64 = 0.35;
const MAX_LLM_BLEND_WEIGHT: f64 = 0.3;
const MIN_LTR_BLEND_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub top_n: usize,
    /// Override for the configured summariser-rerank switch.
    pub enable_llm_rerank: Option<bool>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            enable_llm_rerank: None,
        }
    }
}

/// One scored, persisted match.
#[derive(Debug, Clone)]
pub struct RankedMatch {
    pub match_id: String,
    pub consultant_id: String,
    pub final_score: f64,
    pub linear_score: f64,
    pub ltr_score: f64,
    pub llm_confidence: Option<f64>,
    pub features: FeatureVector,
    pub explanation: serde_json::Value,
}

struct Candidate {
    consultant: Consultant,
    skills: HashMap<String, u32>,
    features: FeatureVector,
    linear: f64,
    ltr: f64,
    summary: Option<MatchSummary>,
}

/// The matching engine: retrieval, feature assembly, staged scoring and
/// transactional persistence with grounded explanations.
pub struct MatchingEngine {
    db: Arc<SurrealDbClient>,
    search: SearchIndex,
    audit: Arc<AuditRecorder>,
    summariser: Arc<dyn MatchSummariser>,
    config: AppConfig,
}

impl MatchingEngine {
    pub fn new(
        db: Arc<SurrealDbClient>,
        search: SearchIndex,
        audit: Arc<AuditRecorder>,
        summariser: Arc<dyn MatchSummariser>,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            search,
            audit,
            summariser,
            config,
        }
    }

    pub fn db(&self) -> &Arc<SurrealDbClient> {
        &self.db
    }

    /// Compute, persist and return the top-N consultant matches for a
    /// requirement.
    pub async fn match_requirement(
        &self,
        tenant: &TenantContext,
        requirement_id: &str,
        options: MatchOptions,
    ) -> Result<Vec<RankedMatch>, AppError> {
        let result = self
            .match_requirement_inner(tenant, requirement_id, &options)
            .await;

        if let Err(err) = &result {
            self.audit
                .record(
                    tenant,
                    AuditEvent::failure(
                        "match.computed",
                        "requirement",
                        Some(requirement_id.to_string()),
                        json!({"error": err.to_string()}),
                        err.result_code(),
                    ),
                )
                .await
                .ok();
        }
        result
    }

    async fn match_requirement_inner(
        &self,
        tenant: &TenantContext,
        requirement_id: &str,
        options: &MatchOptions,
    ) -> Result<Vec<RankedMatch>, AppError> {
        let top_n = options.top_n.max(1);

        let Some(requirement): Option<Requirement> =
            self.db.get_tenant_item(tenant, requirement_id).await?
        else {
            return Err(AppError::NotFound(format!("requirement {requirement_id}")));
        };

        let requirement_skills =
            RequirementSkill::weights_for_requirement(&self.db, tenant, requirement_id).await?;

        let skills_catalog: Vec<Skill> = self.db.get_all_stored_items().await?;
        let skill_names: HashMap<String, String> = skills_catalog
            .into_iter()
            .map(|skill| (skill.id.clone(), skill.name))
            .collect();

        // Candidate retrieval through the hybrid index.
        let query = format!(
            "{}\n{}\n{}",
            requirement.title, requirement.client_name, requirement.description
        );
        let hits = self
            .search
            .hybrid_search(
                tenant,
                HybridSearchRequest {
                    query,
                    entity_types: Some(vec![SearchEntityType::Consultant]),
                    filters: Some(SearchFilters {
                        location: requirement.location.clone(),
                        ..SearchFilters::default()
                    }),
                    limit: Some((top_n * 3).max(MIN_RETRIEVAL_POOL)),
                },
            )
            .await?;

        if hits.is_empty() {
            info!(
                tenant = tenant.tenant_id(),
                requirement_id, "no candidates retrieved for requirement"
            );
            return Ok(Vec::new());
        }

        // Per-candidate loads are independent; fan them out. The futures
        // borrow the requirement, so rebind as references before the move.
        let now = Utc::now();
        let requirement_ref = &requirement;
        let requirement_skills_ref = &requirement_skills;
        let loads = hits.iter().map(|hit| {
            let entity_id = hit.entity_id.clone();
            let vector_score = f64::from(hit.vector_score);
            let lexical_score = f64::from(hit.lexical_score);
            async move {
                let Some(consultant): Option<Consultant> =
                    self.db.get_tenant_item(tenant, &entity_id).await?
                else {
                    // Index entry without a row: stale document, skip it.
                    warn!(%entity_id, "search hit without a consultant row");
                    return Ok::<Option<Candidate>, AppError>(None);
                };
                let skills =
                    ConsultantSkill::weights_for_consultant(&self.db, tenant, &entity_id).await?;
                let features = FeatureVector::assemble(
                    requirement_ref,
                    requirement_skills_ref,
                    &consultant,
                    &skills,
                    vector_score,
                    lexical_score,
                    now,
                );
                Ok(Some(Candidate {
                    consultant,
                    skills,
                    features,
                    linear: 0.0,
                    ltr: 0.0,
                    summary: None,
                }))
            }
        });
        let mut candidates: Vec<Candidate> = try_join_all(loads)
            .await?
            .into_iter()
            .flatten()
            .collect();

        // Hard filters with the unfiltered fallback.
        candidates = apply_hard_filters(
            candidates,
            |candidate| &candidate.features,
            !requirement_skills.is_empty(),
            requirement.location.is_some(),
        );

        // Linear and LTR stages.
        let base_weight = f64::from(self.config.match_base_weight);
        for candidate in &mut candidates {
            candidate.linear = linear_score(&candidate.features, base_weight);
            candidate.ltr = MODEL_V1.score(&candidate.features, candidate.linear);
        }

        // Optional summariser rerank over the LTR leaders.
        let enable_llm = options
            .enable_llm_rerank
            .unwrap_or(self.config.match_llm_rerank_enabled);
        candidates.sort_by(|a, b| {
            b.ltr
                .partial_cmp(&a.ltr)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.consultant.id.cmp(&b.consultant.id))
        });
        if enable_llm {
            let rerank_count = (top_n * 2).min(10).min(candidates.len());
            for candidate in candidates.iter_mut().take(rerank_count) {
                let facts = self.build_facts(&requirement, &requirement_skills, candidate, &skill_names);
                match self.summariser.summarise(&facts).await {
                    Ok(summary) => candidate.summary = Some(summary),
                    Err(err) => {
                        // A failed or cancelled summary falls back to the
                        // LTR score; never a hard failure.
                        warn!(error = %err, "summariser failed; using ltr fallback");
                    }
                }
            }
        }

        // Final blend.
        let llm_weight = if enable_llm {
            f64::from(self.config.match_llm_weight).min(MAX_LLM_BLEND_WEIGHT)
        } else {
            0.0
        };
        let ltr_weight = (1.0 - LINEAR_BLEND_WEIGHT - llm_weight).max(MIN_LTR_BLEND_WEIGHT);
        let total_weight = LINEAR_BLEND_WEIGHT + ltr_weight + llm_weight;

        let mut scored: Vec<(Candidate, f64)> = candidates
            .into_iter()
            .map(|candidate| {
                let llm_component = candidate
                    .summary
                    .as_ref()
                    .map(|summary| summary.confidence)
                    .unwrap_or(candidate.ltr);
                let final_score = ((LINEAR_BLEND_WEIGHT * candidate.linear
                    + ltr_weight * candidate.ltr
                    + llm_weight * llm_component)
                    / total_weight)
                    .clamp(0.0, 1.0);
                (candidate, final_score)
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.consultant.id.cmp(&b.0.consultant.id))
        });
        scored.truncate(top_n);

        // Persist: upsert + snapshot per candidate, then audit.
        let mut ranked = Vec::with_capacity(scored.len());
        for (candidate, final_score) in scored {
            let facts = self.build_facts(&requirement, &requirement_skills, &candidate, &skill_names);
            let (rate_delta, rate_within_range) =
                rate_delta(&candidate.consultant, &requirement);
            let explanation = build_explanation(
                MODEL_V1.version,
                &candidate.features,
                &facts,
                candidate.linear,
                candidate.ltr,
                candidate.summary.as_ref(),
                final_score,
                candidate.consultant.availability.describe(),
                rate_delta,
                rate_within_range,
            );

            let record = MatchRecord::new(
                tenant,
                candidate.consultant.id.clone(),
                requirement_id,
                final_score,
                explanation.clone(),
            );
            let snapshot = MatchFeatureSnapshot::new(
                tenant,
                "pending",
                MODEL_VERSION,
                candidate.features.to_json(),
                explanation.clone(),
            );
            let stored = MatchRecord::upsert_with_snapshot(&self.db, tenant, record, snapshot).await?;

            ranked.push(RankedMatch {
                match_id: stored.id,
                consultant_id: candidate.consultant.id.clone(),
                final_score,
                linear_score: candidate.linear,
                ltr_score: candidate.ltr,
                llm_confidence: candidate.summary.as_ref().map(|s| s.confidence),
                features: candidate.features,
                explanation,
            });
        }

        self.audit
            .record(
                tenant,
                AuditEvent::success(
                    "match.computed",
                    "requirement",
                    Some(requirement_id.to_string()),
                    json!({
                        "matches": ranked.len(),
                        "model_version": MODEL_VERSION,
                        "ranker_version": MODEL_V1.version,
                    }),
                ),
            )
            .await?;

        debug!(
            tenant = tenant.tenant_id(),
            requirement_id,
            matches = ranked.len(),
            "match run persisted"
        );
        Ok(ranked)
    }

    fn build_facts(
        &self,
        requirement: &Requirement,
        requirement_skills: &HashMap<String, u32>,
        candidate: &Candidate,
        skill_names: &HashMap<String, String>,
    ) -> MatchSummaryFacts {
        // Shared skills ordered by requirement weight, heaviest first.
        let mut aligned: Vec<(&String, u32)> = requirement_skills
            .iter()
            .filter(|(skill_id, _)| candidate.skills.contains_key(*skill_id))
            .map(|(skill_id, weight)| (skill_id, *weight))
            .collect();
        aligned.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let aligned_skills: Vec<String> = aligned
            .into_iter()
            .filter_map(|(skill_id, _)| skill_names.get(skill_id).cloned())
            .collect();

        MatchSummaryFacts {
            consultant_name: format!(
                "{} {}",
                candidate.consultant.first_name, candidate.consultant.last_name
            ),
            availability: candidate.consultant.availability.describe().to_string(),
            consultant_location: candidate.consultant.location.clone(),
            consultant_rate: candidate.consultant.rate,
            aligned_skills,
            requirement_title: requirement.title.clone(),
            client_name: requirement.client_name.clone(),
            requirement_location: requirement.location.clone(),
            rate_range: match (requirement.min_rate, requirement.max_rate) {
                (Some(min), Some(max)) => Some((min, max)),
                _ => None,
            },
            skill_overlap: candidate.features.skill_overlap,
            location_match: candidate.features.location_match,
            rate_alignment: candidate.features.rate_alignment,
        }
    }
}

/// Signed distance from the consultant's rate to the requirement band.
fn rate_delta(consultant: &Consultant, requirement: &Requirement) -> (Option<f64>, bool) {
    let Some(rate) = consultant.rate else {
        return (None, false);
    };
    match (requirement.min_rate, requirement.max_rate) {
        (Some(min), Some(max)) => {
            if rate >= min && rate <= max {
                (Some(0.0), true)
            } else if rate < min {
                (Some(rate - min), false)
            } else {
                (Some(rate - max), false)
            }
        }
        (Some(target), None) | (None, Some(target)) => (Some(rate - target), rate == target),
        (None, None) => (None, false),
    }
}
