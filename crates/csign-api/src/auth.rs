//! # Authentication Middleware and Caller Identity
//!
//! Countersign does not own end-user authentication. It trusts a
//! fronting gateway that validates end-user credentials and forwards
//! requests with:
//!
//! - the service bearer token (`Authorization: Bearer <token>`),
//!   checked against the configured `CSIGN_AUTH_TOKEN`; and
//! - trusted identity headers `x-caller-id` (UUID) and
//!   `x-caller-role` (`admin` or `user`).
//!
//! The middleware resolves these into a [`CallerIdentity`] request
//! extension. Handlers receive the resolved identity as an explicit
//! extractor parameter — there is no ambient session state and raw
//! credentials never reach the domain layer.
//!
//! When no service token is configured (development mode) the bearer
//! check is skipped, but the caller headers are still required.

use axum::extract::{FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use csign_core::UserId;

use crate::error::AppError;

/// Header carrying the gateway-resolved caller id.
pub const CALLER_ID_HEADER: &str = "x-caller-id";
/// Header carrying the gateway-resolved caller role.
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";

/// Caller role, as resolved by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// The resolved identity of the caller, injected per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: UserId,
    pub role: Role,
}

impl CallerIdentity {
    /// Whether the caller holds the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("caller identity not resolved".to_string()))
    }
}

/// Service-level auth configuration, injected as a router extension.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// The expected bearer token. `None` disables the token check.
    pub token: Option<String>,
}

/// Resolve and validate caller credentials on every API request.
///
/// Rejects with 401 when the bearer token is wrong or the caller
/// headers are missing or malformed. On success, inserts
/// [`CallerIdentity`] into the request extensions.
pub async fn auth_middleware(
    Extension(config): Extension<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &config.token {
        let presented = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match presented {
            Some(token) if token == expected => {}
            _ => {
                return AppError::Unauthorized("missing or invalid bearer token".to_string())
                    .into_response();
            }
        }
    }

    let caller = match resolve_caller(&request) {
        Ok(caller) => caller,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(caller);
    next.run(request).await
}

/// Parse the trusted caller headers into a [`CallerIdentity`].
fn resolve_caller(request: &Request) -> Result<CallerIdentity, AppError> {
    let raw_id = request
        .headers()
        .get(CALLER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("missing {CALLER_ID_HEADER} header")))?;

    let user_id = Uuid::parse_str(raw_id)
        .map(UserId::from_uuid)
        .map_err(|_| AppError::Unauthorized(format!("invalid {CALLER_ID_HEADER} header")))?;

    let role = match request
        .headers()
        .get(CALLER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some("admin") => Role::Admin,
        Some("user") | None => Role::User,
        Some(other) => {
            return Err(AppError::Unauthorized(format!(
                "unknown caller role: {other}"
            )));
        }
    };

    Ok(CallerIdentity { user_id, role })
}
