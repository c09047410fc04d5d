#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

//! Matching engine: candidate retrieval through the hybrid index, feature
//! vector assembly, linear + gradient-boosted scoring with an optional
//! grounded summariser rerank, explained persistence, feedback aggregation
//! and ranking evaluation.

pub mod engine;
pub mod evaluation;
pub mod features;
pub mod feedback;
pub mod filters;
pub mod linear;
pub mod ltr;
pub mod summary;

mod explanation;

pub use engine::{MatchOptions, MatchingEngine, RankedMatch};
pub use evaluation::{EvaluationOptions, EvaluationWindow};
pub use features::FeatureVector;
pub use summary::{MatchSummariser, MatchSummary, MatchSummaryFacts, RuleBasedSummariser};

/// Version stamp written into feature snapshots and explanations.
pub const MODEL_VERSION: &str = "match-linear-v2";
