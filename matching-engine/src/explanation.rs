use serde_json::{json, Value};

use crate::features::FeatureVector;
use crate::linear::contributions;
use crate::summary::{MatchSummary, MatchSummaryFacts};
use crate::MODEL_VERSION;

/// Human-readable grade for the location feature value.
fn location_status(location_match: f64) -> &'static str {
    if location_match >= 0.99 {
        "MATCH"
    } else if location_match >= 0.8 {
        "REMOTE"
    } else if location_match >= 0.6 {
        "REGION"
    } else if (location_match - 0.5).abs() < 1e-9 {
        "UNKNOWN"
    } else {
        "DIFFERENT"
    }
}

/// Assemble the full explanation payload persisted on the match row.
#[allow(clippy::too_many_arguments)]
pub fn build_explanation(
    ranker_version: &str,
    features: &FeatureVector,
    facts: &MatchSummaryFacts,
    linear: f64,
    ltr: f64,
    summary: Option<&MatchSummary>,
    final_score: f64,
    availability_description: &str,
    rate_delta: Option<f64>,
    rate_within_range: bool,
) -> Value {
    let contribution_rows: Vec<Value> = contributions(features)
        .into_iter()
        .map(|(feature, value, weight, contribution)| {
            json!({
                "feature": feature,
                "value": value,
                "weight": weight,
                "contribution": contribution,
            })
        })
        .collect();

    json!({
        "model_version": MODEL_VERSION,
        "ranker_version": ranker_version,
        "aligned_skills": facts.aligned_skills,
        "contributions": contribution_rows,
        "deltas": {
            "location": {"status": location_status(features.location_match)},
            "rate": {"delta": rate_delta, "within_range": rate_within_range},
            "availability": {"description": availability_description},
        },
        "retrieval": {
            "vector_score": features.vector_score,
            "lexical_score": features.lexical_score,
            "retrieval_score": features.retrieval_score(),
        },
        "stages": {
            "linear": linear,
            "ltr": ltr,
            "llm_confidence": summary.map(|s| s.confidence),
            "final": final_score,
        },
        "highlights": summary.map(|s| s.highlights.clone()).unwrap_or_default(),
        "facts": serde_json::to_value(facts).unwrap_or(Value::Null),
    })
}
