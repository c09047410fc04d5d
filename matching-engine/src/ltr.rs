//! Learning-to-rank stage: a small gradient-boosted ensemble shipped as a
//! versioned static table. The trees are published data, not code; loading
//! a new version is an explicit swap of the model constant.

use crate::features::FeatureVector;

/// Input slots the trees index into.
pub const LTR_FEATURES: [&str; 9] = [
    "skill_overlap",
    "vector_score",
    "lexical_score",
    "availability",
    "location_match",
    "rate_alignment",
    "recency_score",
    "linear_score",
    "retrieval_score",
];

/// One node of a decision tree. Leaves have `left == -1` and carry the
/// response in `value`; internal nodes route on `feature < threshold`.
#[derive(Debug, Clone, Copy)]
pub struct LtrNode {
    pub feature: usize,
    pub threshold: f64,
    pub left: i32,
    pub right: i32,
    pub value: f64,
}

const fn split(feature: usize, threshold: f64, left: i32, right: i32) -> LtrNode {
    LtrNode {
        feature,
        threshold,
        left,
        right,
        value: 0.0,
    }
}

const fn leaf(value: f64) -> LtrNode {
    LtrNode {
        feature: 0,
        threshold: 0.0,
        left: -1,
        right: -1,
        value,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LtrModel {
    pub version: &'static str,
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: &'static [&'static [LtrNode]],
}

// Published ensemble. Feature indexes follow LTR_FEATURES.
const TREE_1: [LtrNode; 7] = [
    split(0, 0.3, 1, 2),  // skill_overlap
    split(7, 0.35, 3, 4), // linear_score
    split(3, 0.5, 5, 6),  // availability
    leaf(-0.9),
    leaf(-0.3),
    leaf(-0.6),
    leaf(0.9),
];

const TREE_2: [LtrNode; 7] = [
    split(8, 0.25, 1, 2), // retrieval_score
    split(0, 0.5, 3, 4),  // skill_overlap
    split(4, 0.5, 5, 6),  // location_match
    leaf(-0.7),
    leaf(0.1),
    leaf(0.15),
    leaf(0.75),
];

const TREE_3: [LtrNode; 5] = [
    split(3, 0.3, 1, 2), // availability
    leaf(-0.85),
    split(5, 0.6, 3, 4), // rate_alignment
    leaf(-0.1),
    leaf(0.6),
];

const TREE_4: [LtrNode; 7] = [
    split(7, 0.55, 1, 2), // linear_score
    split(1, 0.3, 3, 4),  // vector_score
    split(0, 0.7, 5, 6),  // skill_overlap
    leaf(-0.6),
    leaf(-0.1),
    leaf(0.4),
    leaf(0.85),
];

const TREE_5: [LtrNode; 5] = [
    split(6, 0.4, 1, 2), // recency_score
    leaf(-0.2),
    split(2, 0.3, 3, 4), // lexical_score
    leaf(0.1),
    leaf(0.45),
];

const TREE_6: [LtrNode; 5] = [
    split(4, 0.55, 1, 2), // location_match
    leaf(-0.4),
    split(5, 0.5, 3, 4), // rate_alignment
    leaf(-0.1),
    leaf(0.45),
];

pub const MODEL_V1: LtrModel = LtrModel {
    version: "ltr-gbdt-v1",
    base_score: 0.0,
    learning_rate: 0.3,
    trees: &[&TREE_1, &TREE_2, &TREE_3, &TREE_4, &TREE_5, &TREE_6],
};

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn eval_tree(tree: &[LtrNode], inputs: &[f64; 9]) -> f64 {
    let mut index = 0usize;
    loop {
        let node = tree[index];
        if node.left < 0 {
            return node.value;
        }
        let feature = inputs.get(node.feature).copied().unwrap_or(0.0);
        index = if feature < node.threshold {
            node.left as usize
        } else {
            node.right as usize
        };
    }
}

impl LtrModel {
    /// Probability in `[0, 1]`: `sigmoid(base + η · Σ trees)`.
    pub fn score(&self, features: &FeatureVector, linear_score: f64) -> f64 {
        let inputs = [
            features.skill_overlap,
            features.vector_score,
            features.lexical_score,
            features.availability,
            features.location_match,
            features.rate_alignment,
            features.recency_score,
            linear_score,
            features.retrieval_score(),
        ];

        let raw: f64 = self
            .trees
            .iter()
            .map(|tree| eval_tree(tree, &inputs))
            .sum();
        sigmoid(self.base_score + self.learning_rate * raw)
    }
}
