pub mod analytics;
pub mod documents;
pub mod evals;
pub mod ingestion;
pub mod liveness;
pub mod matching;
pub mod readiness;
pub mod search;
