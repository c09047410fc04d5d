use crate::features::FeatureVector;

/// Hard-filter thresholds. A candidate failing any applicable predicate is
/// dropped before scoring.
const MIN_SKILL_OVERLAP: f64 = 0.15;
const MIN_LOCATION_MATCH: f64 = 0.25;
const MIN_RATE_ALIGNMENT: f64 = 0.2;

/// Whether the candidate survives the hard filters. The skill and location
/// predicates only apply when the requirement actually constrains them.
pub fn passes_hard_filters(
    features: &FeatureVector,
    requirement_has_skills: bool,
    requirement_has_location: bool,
) -> bool {
    if features.availability <= 0.0 {
        return false;
    }
    if requirement_has_skills && features.skill_overlap < MIN_SKILL_OVERLAP {
        return false;
    }
    if requirement_has_location && features.location_match < MIN_LOCATION_MATCH {
        return false;
    }
    if features.rate_alignment < MIN_RATE_ALIGNMENT {
        return false;
    }
    true
}

/// Apply the filters; when nothing survives, fall back to the unfiltered
/// baseline instead of returning an empty slate.
pub fn apply_hard_filters<T>(
    candidates: Vec<T>,
    features_of: impl Fn(&T) -> &FeatureVector,
    requirement_has_skills: bool,
    requirement_has_location: bool,
) -> Vec<T> {
    let mut surviving = Vec::with_capacity(candidates.len());
    let mut rejected = Vec::new();

    for candidate in candidates {
        if passes_hard_filters(
            features_of(&candidate),
            requirement_has_skills,
            requirement_has_location,
        ) {
            surviving.push(candidate);
        } else {
            rejected.push(candidate);
        }
    }

    if surviving.is_empty() {
        rejected
    } else {
        surviving
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(availability: f64, skill_overlap: f64) -> FeatureVector {
        FeatureVector {
            skill_overlap,
            vector_score: 0.5,
            lexical_score: 0.5,
            availability,
            location_match: 0.6,
            rate_alignment: 0.8,
            recency_score: 0.5,
        }
    }

    #[test]
    fn unavailable_candidates_are_dropped() {
        assert!(!passes_hard_filters(&features(0.0, 0.9), true, true));
        assert!(passes_hard_filters(&features(0.25, 0.9), true, true));
    }

    #[test]
    fn skill_threshold_only_applies_with_requirement_skills() {
        let weak = features(1.0, 0.05);
        assert!(!passes_hard_filters(&weak, true, true));
        assert!(passes_hard_filters(&weak, false, true));
    }

    #[test]
    fn empty_filtered_set_falls_back_to_baseline() {
        let candidates = vec![features(0.0, 0.9), features(0.0, 0.8)];
        let result = apply_hard_filters(candidates, |f| f, true, true);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn survivors_replace_the_baseline() {
        let candidates = vec![features(1.0, 0.9), features(0.0, 0.8)];
        let result = apply_hard_filters(candidates, |f| f, true, true);
        assert_eq!(result.len(), 1);
        assert!(result[0].availability > 0.0);
    }
}
