//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps [`EngineError`] kinds to HTTP status codes and returns JSON bodies
//! of the form `{"error":{"code","message"}}`. Internal and configuration
//! failures are logged and never echoed to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use flota_core::EngineError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "CONCURRENCY_CONFLICT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for some client errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body or query could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Caller headers missing or malformed (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller's role may not invoke the operation (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Operation not legal in the entity's current state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The entity moved on since the caller read it (409).
    #[error("concurrency conflict: {message}")]
    ConcurrencyConflict {
        message: String,
        expected: u64,
        actual: u64,
    },

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            Self::ConcurrencyConflict { .. } => (StatusCode::CONFLICT, "CONCURRENCY_CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::ConcurrencyConflict { message, .. } => message.clone(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let details = match &self {
            Self::ConcurrencyConflict {
                expected, actual, ..
            } => Some(serde_json::json!({
                "expected_version": expected,
                "actual_version": actual,
            })),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound { .. } => Self::NotFound(err.to_string()),
            EngineError::InvalidTransition { .. } | EngineError::InvalidState { .. } => {
                Self::Conflict(err.to_string())
            }
            EngineError::Validation(msg) => Self::Validation(msg),
            EngineError::Configuration(_) => Self::Internal(err.to_string()),
            EngineError::ConcurrencyConflict {
                expected, actual, ..
            } => Self::ConcurrencyConflict {
                message: err.to_string(),
                expected,
                actual,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_kinds_map_to_statuses() {
        let cases = [
            (EngineError::not_found("incident", "x"), StatusCode::NOT_FOUND),
            (
                EngineError::invalid_transition("nueva", "cerrada"),
                StatusCode::CONFLICT,
            ),
            (
                EngineError::invalid_state("edit_incident", "cerrada"),
                StatusCode::CONFLICT,
            ),
            (
                EngineError::Validation("blank".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                EngineError::Configuration("no sla".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_and_code().0, status);
        }
    }

    #[test]
    fn concurrency_conflict_has_its_own_code() {
        let err = AppError::from(EngineError::ConcurrencyConflict {
            entity: "incident:1".into(),
            expected: 2,
            actual: 3,
        });
        assert_eq!(
            err.status_and_code(),
            (StatusCode::CONFLICT, "CONCURRENCY_CONFLICT")
        );
    }

    #[test]
    fn error_body_skips_absent_details() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "NOT_FOUND".to_string(),
                message: "incident 1 not found".to_string(),
                details: None,
            },
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("NOT_FOUND"));
        assert!(!json.contains("details"));
    }

    // ── into_response tests ──────────────────────────────────────

    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn into_response_forbidden() {
        let (status, body) = response_parts(AppError::Forbidden("nope".into())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error.code, "FORBIDDEN");
        assert!(body.error.message.contains("nope"));
    }

    #[tokio::test]
    async fn into_response_conflict_carries_versions() {
        let err = AppError::from(EngineError::ConcurrencyConflict {
            entity: "work_order:9".into(),
            expected: 4,
            actual: 5,
        });
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "CONCURRENCY_CONFLICT");
        let details = body.error.details.unwrap();
        assert_eq!(details["expected_version"], 4);
        assert_eq!(details["actual_version"], 5);
    }

    #[tokio::test]
    async fn into_response_hides_configuration_details() {
        let err = AppError::from(EngineError::Configuration(
            "no SLA windows for critical".into(),
        ));
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert_eq!(body.error.message, "An internal error occurred");
    }
}
