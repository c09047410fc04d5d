use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Authorization error: {0}")]
    Auth(String),
    #[error("Transient error: {0}")]
    Transient(String),
    #[error("Circuit open for {key}, retry after {retry_after_ms}ms")]
    CircuitOpen { key: String, retry_after_ms: u64 },
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Audit integrity violation: {0}")]
    Integrity(String),
    #[error("Fatal invariant violation: {0}")]
    Fatal(String),
    #[error("Ingestion processing error: {0}")]
    Processing(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Whether the queue retry policy should be given a chance.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Transient(_) | AppError::CircuitOpen { .. } | AppError::Database(_)
        )
    }

    /// Result code recorded on audit entries for this failure.
    pub fn result_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Auth(_) => "AUTH_ERROR",
            AppError::Transient(_) => "TRANSIENT_ERROR",
            AppError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            AppError::RateLimited(_) => "RATE_LIMITED",
            AppError::Integrity(_) => "INTEGRITY_ERROR",
            AppError::Fatal(_) => "FATAL_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}
