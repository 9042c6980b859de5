//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from csign-engine to HTTP status codes and
//! returns JSON error bodies with a machine-readable code and a
//! human-readable message. Internal error details are never exposed
//! in responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use csign_engine::TransitionError;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the
/// API surface.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "CONFLICT").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`].
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (422).
    ///
    /// Normalized with `Validation` to 422 Unprocessable Entity: the
    /// client sent syntactically valid HTTP but semantically invalid
    /// content. Only malformed HTTP framing is 400.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authentication failure — missing or invalid credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authorization failure — insufficient permissions (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state (409): an illegal
    /// lifecycle transition, a lost transition race, or a
    /// referential-integrity violation on delete.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The HTTP status code and machine-readable code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Convert engine transition errors to API errors.
///
/// Illegal (state, actor) pairs are conflicts with the application's
/// current state; schema failures on submitted form data are
/// validation errors.
impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match &err {
            TransitionError::InvalidState { .. }
            | TransitionError::NotApplicant { .. }
            | TransitionError::NotCurrentApprover { .. } => Self::Conflict(err.to_string()),
            TransitionError::Form(_) => Self::Validation(err.to_string()),
        }
    }
}

impl From<csign_engine::FormError> for AppError {
    fn from(err: csign_engine::FormError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<csign_engine::RouteError> for AppError {
    fn from(err: csign_engine::RouteError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csign_core::UserId;
    use csign_engine::{ApprovalStatus, FormError};

    #[test]
    fn test_not_found_status_code() {
        let err = AppError::NotFound("missing application".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn test_validation_status_code() {
        let err = AppError::Validation("bad field".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_bad_request_is_unprocessable_entity() {
        let err = AppError::BadRequest("malformed JSON".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[test]
    fn test_conflict_status_code() {
        let err = AppError::Conflict("not in draft".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "CONFLICT");
    }

    #[test]
    fn test_invalid_state_converts_to_conflict() {
        let engine_err = TransitionError::InvalidState {
            action: "approve",
            status: ApprovalStatus::Draft,
        };
        let app_err = AppError::from(engine_err);
        let (status, _) = app_err.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_wrong_approver_converts_to_conflict() {
        let engine_err = TransitionError::NotCurrentApprover {
            caller: UserId::new(),
            step: 2,
        };
        let (status, _) = AppError::from(engine_err).status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_form_error_converts_to_validation() {
        let engine_err = TransitionError::Form(FormError::MissingRequiredField {
            name: "amount".to_string(),
        });
        let app_err = AppError::from(engine_err);
        let (status, code) = app_err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
        assert!(app_err.to_string().contains("amount"));
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
    async fn test_into_response_not_found() {
        let (status, body) = response_parts(AppError::NotFound("application 123".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("application 123"));
    }

    #[tokio::test]
    async fn test_into_response_internal_hides_details() {
        let (status, body) = response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(
            !body.error.message.contains("db connection"),
            "internal error details must not leak: {}",
            body.error.message
        );
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[tokio::test]
    async fn test_into_response_conflict() {
        let (status, body) = response_parts(AppError::Conflict("already decided".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "CONFLICT");
        assert!(body.error.message.contains("already decided"));
    }
}
