//! # Request Body Extraction and Validation
//!
//! Handlers take `Result<Json<T>, JsonRejection>` and pass it through
//! [`extract_validated_json`], which normalizes body parse failures to
//! 422 and then runs the payload's own [`Validate`] checks. Keeping
//! the rejection explicit in the signature means a malformed body
//! reaches our error shape instead of axum's default plain-text 400.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Request payloads that carry their own semantic checks.
///
/// Runs after serde has accepted the shape; this is for rules serde
/// cannot express (non-empty names, step ordering, and so on).
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap a JSON body extraction and validate the payload.
pub fn extract_validated_json<T: Validate>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(payload) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    payload.validate().map_err(AppError::Validation)?;
    Ok(payload)
}
