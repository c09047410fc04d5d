use std::cmp::Ordering;

/// Subscores gathered from the two retrieval signals. `None` means the
/// signal did not surface the document at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scores {
    pub vector: Option<f32>,
    pub lexical: Option<f32>,
}

pub const fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Cosine distance from the index is in `[0, 2]`; similarity is clamped
/// into the unit interval.
pub fn distance_to_similarity(distance: f32) -> f32 {
    if !distance.is_finite() {
        return 0.0;
    }
    clamp_unit(1.0 - distance)
}

/// Min-max normalise raw lexical scores into `[0, 1]`. BM25 magnitudes are
/// query-dependent, so only the relative order within one result set is
/// meaningful.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }

    let mut min = f32::MAX;
    let mut max = f32::MIN;

    for s in scores {
        if !s.is_finite() {
            continue;
        }
        if *s < min {
            min = *s;
        }
        if *s > max {
            max = *s;
        }
    }

    if !min.is_finite() || !max.is_finite() {
        return scores.iter().map(|_| 0.0).collect();
    }

    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; scores.len()];
    }

    scores
        .iter()
        .map(|score| {
            if score.is_finite() {
                clamp_unit((score - min) / (max - min))
            } else {
                0.0
            }
        })
        .collect()
}

/// Weighted hybrid total: `wV · vector + wL · lexical`, missing signals
/// contribute zero.
pub fn fuse_scores(scores: &Scores, vector_weight: f32, lexical_weight: f32) -> f32 {
    let vector = scores.vector.unwrap_or(0.0);
    let lexical = scores.lexical.unwrap_or(0.0);
    clamp_unit(vector.mul_add(vector_weight, lexical * lexical_weight))
}

/// Sort by descending fused score, tie-breaking on the key so ordering is
/// reproducible.
pub fn sort_by_score_desc<T, K>(items: &mut [T], score: impl Fn(&T) -> f32, key: impl Fn(&T) -> K)
where
    K: Ord,
{
    items.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| key(a).cmp(&key(b)))
    });
}
