use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Temporarily unavailable: {message}")]
    Unavailable { message: String, retry_after_secs: u64 },
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::Validation(msg) => Self::ValidationError(msg),
            AppError::Auth(msg) => Self::Unauthorized(msg),
            AppError::RateLimited(msg) => Self::RateLimited(msg),
            AppError::CircuitOpen { key, retry_after_ms } => Self::Unavailable {
                message: format!("dependency {key} is unavailable"),
                retry_after_secs: retry_after_ms.div_ceil(1000).max(1),
            },
            AppError::Transient(msg) => Self::Unavailable {
                message: msg,
                retry_after_secs: 5,
            },
            other => {
                tracing::error!("Internal error: {:?}", other);
                Self::InternalError("Internal server error".to_string())
            }
        }
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, retry_after, message) = match self {
            Self::InternalError(message) => (StatusCode::INTERNAL_SERVER_ERROR, None, message),
            Self::ValidationError(message) => (StatusCode::BAD_REQUEST, None, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, None, message),
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, None, message),
            Self::RateLimited(message) => (StatusCode::TOO_MANY_REQUESTS, None, message),
            Self::Unavailable {
                message,
                retry_after_secs,
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                Some(retry_after_secs),
                message,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            status: "error".to_string(),
        });

        match retry_after {
            Some(secs) => (
                status,
                [(header::RETRY_AFTER, secs.to_string())],
                body,
            )
                .into_response(),
            None => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_errors_map_to_expected_statuses() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (
                AppError::NotFound("x".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Validation("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::Auth("x".into()), StatusCode::UNAUTHORIZED),
            (
                AppError::RateLimited("x".into()),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AppError::Transient("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Fatal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn circuit_open_carries_retry_after() {
        let err = AppError::CircuitOpen {
            key: "ai_service".into(),
            retry_after_ms: 2500,
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let retry = response
            .headers()
            .get(header::RETRY_AFTER)
            .expect("retry-after header");
        assert_eq!(retry, "3");
    }
}
