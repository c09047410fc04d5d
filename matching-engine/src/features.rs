use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use common::storage::types::consultant::Consultant;
use common::storage::types::requirement::Requirement;

/// Days after which a stale consultant profile scores zero recency.
const RECENCY_HORIZON_DAYS: f64 = 90.0;

/// Per-candidate feature vector. Every component is clamped into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub skill_overlap: f64,
    pub vector_score: f64,
    pub lexical_score: f64,
    pub availability: f64,
    pub location_match: f64,
    pub rate_alignment: f64,
    pub recency_score: f64,
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

impl FeatureVector {
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        requirement: &Requirement,
        requirement_skills: &HashMap<String, u32>,
        consultant: &Consultant,
        consultant_skills: &HashMap<String, u32>,
        vector_score: f64,
        lexical_score: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            skill_overlap: skill_overlap(requirement_skills, consultant_skills),
            vector_score: clamp_unit(vector_score),
            lexical_score: clamp_unit(lexical_score),
            availability: consultant.availability.score(),
            location_match: location_match(
                requirement.location.as_deref(),
                consultant.location.as_deref(),
            ),
            rate_alignment: rate_alignment(
                consultant.rate,
                requirement.min_rate,
                requirement.max_rate,
            ),
            recency_score: recency_score(consultant.updated_at, now),
        }
    }

    /// Weighted retrieval blend reused by the LTR stage.
    pub fn retrieval_score(&self) -> f64 {
        clamp_unit(0.6 * self.vector_score + 0.4 * self.lexical_score)
    }

    /// Named components in a fixed order.
    pub fn named(&self) -> [(&'static str, f64); 7] {
        [
            ("skill_overlap", self.skill_overlap),
            ("vector_score", self.vector_score),
            ("lexical_score", self.lexical_score),
            ("availability", self.availability),
            ("location_match", self.location_match),
            ("rate_alignment", self.rate_alignment),
            ("recency_score", self.recency_score),
        ]
    }

    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (name, value) in self.named() {
            map.insert(name.to_string(), json!(value));
        }
        Value::Object(map)
    }
}

/// `Σ min(reqW, conW) / Σ reqW` over shared skills; zero when the
/// requirement names no skills.
pub fn skill_overlap(
    requirement_skills: &HashMap<String, u32>,
    consultant_skills: &HashMap<String, u32>,
) -> f64 {
    let total: u64 = requirement_skills.values().map(|w| u64::from(*w)).sum();
    if total == 0 {
        return 0.0;
    }

    let shared: u64 = requirement_skills
        .iter()
        .filter_map(|(skill_id, req_weight)| {
            consultant_skills
                .get(skill_id)
                .map(|con_weight| u64::from(*req_weight.min(con_weight)))
        })
        .sum();

    clamp_unit(shared as f64 / total as f64)
}

/// Graded location compatibility. Either side missing is the neutral 0.5.
pub fn location_match(requirement: Option<&str>, consultant: Option<&str>) -> f64 {
    let (Some(requirement), Some(consultant)) = (requirement, consultant) else {
        return 0.5;
    };
    let req = requirement.trim().to_lowercase();
    let con = consultant.trim().to_lowercase();

    if req == con {
        return 1.0;
    }
    if req.contains("remote") || con.contains("remote") {
        return 0.8;
    }

    let req_city = req.split(',').next().unwrap_or(&req).trim();
    let con_city = con.split(',').next().unwrap_or(&con).trim();
    if req_city == con_city {
        return 0.6;
    }

    0.25
}

/// Rate compatibility against the requirement's band. Span is clamped to
/// at least 1 so equal bounds cannot blow up the distance term.
pub fn rate_alignment(rate: Option<f64>, min_rate: Option<f64>, max_rate: Option<f64>) -> f64 {
    let Some(rate) = rate else {
        return 0.5;
    };

    match (min_rate, max_rate) {
        (Some(min), Some(max)) => {
            if rate >= min && rate <= max {
                1.0
            } else {
                let span = (max - min).max(1.0);
                let mid = (min + max) / 2.0;
                clamp_unit(1.0 - (rate - mid).abs() / (1.5 * span))
            }
        }
        (Some(target), None) | (None, Some(target)) => {
            if target <= 0.0 {
                0.5
            } else {
                clamp_unit(1.0 - (rate - target).abs() / target)
            }
        }
        (None, None) => 0.5,
    }
}

/// Linear decay from 1 at `updated_at == now` to 0 at the horizon.
pub fn recency_score(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - updated_at).num_seconds().max(0) as f64 / 86_400.0;
    clamp_unit(1.0 - age_days / RECENCY_HORIZON_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn weights(pairs: &[(&str, u32)]) -> HashMap<String, u32> {
        pairs
            .iter()
            .map(|(id, weight)| (id.to_string(), *weight))
            .collect()
    }

    #[test]
    fn skill_overlap_uses_min_of_weights() {
        let requirement = weights(&[("ts", 60), ("react", 40)]);
        let consultant = weights(&[("ts", 55), ("node", 45)]);
        // min(60,55) / 100
        assert!((skill_overlap(&requirement, &consultant) - 0.55).abs() < 1e-9);

        let full = weights(&[("ts", 60), ("react", 40)]);
        assert!((skill_overlap(&requirement, &full) - 1.0).abs() < 1e-9);

        assert_eq!(skill_overlap(&HashMap::new(), &consultant), 0.0);
    }

    #[test]
    fn location_grades_follow_the_spec_ladder() {
        assert_eq!(location_match(Some("Austin, TX"), Some("austin, tx")), 1.0);
        assert_eq!(location_match(Some("Austin"), Some("Remote")), 0.8);
        assert_eq!(location_match(Some("Austin, TX"), Some("Austin, Texas")), 0.6);
        assert_eq!(location_match(Some("Austin"), Some("Denver")), 0.25);
        assert_eq!(location_match(None, Some("Austin")), 0.5);
        assert_eq!(location_match(Some("Austin"), None), 0.5);
    }

    #[test]
    fn rate_alignment_band_and_single_bound() {
        // Inside the band.
        assert_eq!(rate_alignment(Some(100.0), Some(80.0), Some(120.0)), 1.0);
        // Outside the band decays with distance from the midpoint.
        let outside = rate_alignment(Some(160.0), Some(80.0), Some(120.0));
        assert!(outside < 1.0 && outside > 0.0);
        // Equal bounds: span clamps to 1 instead of dividing by zero.
        let pinned = rate_alignment(Some(101.0), Some(100.0), Some(100.0));
        assert!(pinned > 0.0 && pinned < 1.0);
        // Single bound.
        assert_eq!(rate_alignment(Some(100.0), Some(100.0), None), 1.0);
        let off_target = rate_alignment(Some(50.0), None, Some(100.0));
        assert!((off_target - 0.5).abs() < 1e-9);
        // Missing data is neutral.
        assert_eq!(rate_alignment(None, Some(80.0), Some(120.0)), 0.5);
        assert_eq!(rate_alignment(Some(100.0), None, None), 0.5);
    }

    #[test]
    fn recency_decays_over_ninety_days() {
        let now = Utc::now();
        assert_eq!(recency_score(now, now), 1.0);
        let half = recency_score(now - Duration::days(45), now);
        assert!((half - 0.5).abs() < 0.01);
        assert_eq!(recency_score(now - Duration::days(200), now), 0.0);
    }

    #[test]
    fn all_components_stay_in_unit_interval() {
        let vector = FeatureVector {
            skill_overlap: 0.5,
            vector_score: 0.9,
            lexical_score: 0.1,
            availability: 1.0,
            location_match: 0.6,
            rate_alignment: 1.0,
            recency_score: 0.8,
        };
        for (_, value) in vector.named() {
            assert!((0.0..=1.0).contains(&value));
        }
        assert!((vector.retrieval_score() - (0.6 * 0.9 + 0.4 * 0.1)).abs() < 1e-9);
    }
}
