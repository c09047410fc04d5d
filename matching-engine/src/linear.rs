use crate::features::FeatureVector;

/// Fixed linear weights over the feature vector.
pub const LINEAR_WEIGHTS: [(&str, f64); 7] = [
    ("skill_overlap", 0.35),
    ("vector_score", 0.25),
    ("lexical_score", 0.10),
    ("availability", 0.10),
    ("location_match", 0.10),
    ("rate_alignment", 0.07),
    ("recency_score", 0.03),
];

/// `clamp(base + Σ wᵢ · fᵢ)` into `[0, 1]`.
pub fn linear_score(features: &FeatureVector, base_weight: f64) -> f64 {
    let weighted: f64 = features
        .named()
        .iter()
        .zip(LINEAR_WEIGHTS.iter())
        .map(|((_, value), (_, weight))| value * weight)
        .sum();
    (base_weight + weighted).clamp(0.0, 1.0)
}

/// Per-feature contribution rows for the explanation payload.
pub fn contributions(features: &FeatureVector) -> Vec<(&'static str, f64, f64, f64)> {
    let mut rows: Vec<(&'static str, f64, f64, f64)> = features
        .named()
        .iter()
        .zip(LINEAR_WEIGHTS.iter())
        .map(|((name, value), (_, weight))| (*name, *value, *weight, value * weight))
        .collect();
    rows.sort_by(|a, b| b.3.partial_cmp(&a.3).unwrap_or(std::cmp::Ordering::Equal));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perfect() -> FeatureVector {
        FeatureVector {
            skill_overlap: 1.0,
            vector_score: 1.0,
            lexical_score: 1.0,
            availability: 1.0,
            location_match: 1.0,
            rate_alignment: 1.0,
            recency_score: 1.0,
        }
    }

    fn hopeless() -> FeatureVector {
        FeatureVector {
            skill_overlap: 0.0,
            vector_score: 0.0,
            lexical_score: 0.0,
            availability: 0.0,
            location_match: 0.0,
            rate_alignment: 0.0,
            recency_score: 0.0,
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let total: f64 = LINEAR_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn linear_score_is_clamped() {
        // Perfect features + base would exceed one without the clamp.
        assert_eq!(linear_score(&perfect(), 0.2), 1.0);
        assert_eq!(linear_score(&hopeless(), 0.2), 0.2);
        assert_eq!(linear_score(&hopeless(), 0.0), 0.0);
    }

    #[test]
    fn contributions_are_sorted_descending() {
        let features = FeatureVector {
            skill_overlap: 1.0,
            vector_score: 0.1,
            lexical_score: 0.9,
            availability: 0.5,
            location_match: 0.5,
            rate_alignment: 0.5,
            recency_score: 0.5,
        };
        let rows = contributions(&features);
        assert_eq!(rows[0].0, "skill_overlap");
        for pair in rows.windows(2) {
            assert!(pair[0].3 >= pair[1].3);
        }
    }
}
