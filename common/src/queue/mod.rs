pub mod worker;

/// Logical queue names. Every queue has a dead-letter side addressed as
/// `<name>.dlq`, backed by the `Dead` job status.
pub const RESUME_INGESTION: &str = "resume.ingestion";
pub const REQUIREMENT_INGESTION: &str = "requirement.ingestion";
pub const WEBHOOK_PROCESSING: &str = "webhook.processing";
pub const SYNC_PROCESSING: &str = "sync.processing";

pub use worker::{JobHandler, WorkerPool};
