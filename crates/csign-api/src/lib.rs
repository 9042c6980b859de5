//! # csign-api — Axum API Service for Countersign
//!
//! Countersign is a multi-step approval workflow engine. Administrators
//! define approval forms (ordered field schemas) and approval routes
//! (ordered approver sequences); users draft applications against them,
//! submit for approval, and approvers advance or reject them step by
//! step. Final approval files an output document into the form's
//! target folder.
//!
//! ## API Surface
//!
//! | Prefix                      | Module                       | Domain                 |
//! |-----------------------------|------------------------------|------------------------|
//! | `/v1/approval-forms/*`      | [`routes::approval_forms`]   | Form registry          |
//! | `/v1/approval-routes/*`     | [`routes::approval_routes`]  | Route registry         |
//! | `/v1/applications/*`        | [`routes::applications`]     | Application lifecycle  |
//! | `/v1/folders/*`             | [`routes::folders`]          | Folders                |
//! | `/v1/documents/*`           | [`routes::folders`]          | Filed documents        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Auto-generated OpenAPI spec via utoipa derive macros at `/openapi.json`.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::Router;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// The service bearer token is read from `CSIGN_AUTH_TOKEN`; when unset
/// the token check is disabled and only the caller headers are enforced.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: std::env::var("CSIGN_AUTH_TOKEN").ok(),
    };
    app_with_auth(state, auth_config)
}

/// Assemble the router with an explicit auth configuration.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware
/// so they remain accessible without credentials.
pub fn app_with_auth(state: AppState, auth_config: AuthConfig) -> Router {
    // Authenticated API routes.
    //
    // Body size limit: 2 MiB. Form data payloads are small structured
    // JSON; anything larger is a client error.
    let api = Router::new()
        .merge(routes::approval_forms::router())
        .merge(routes::approval_routes::router())
        .merge(routes::applications::router())
        .merge(routes::folders::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(from_fn(auth::auth_middleware))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    // Unauthenticated health probes — readiness checks actual service health.
    let unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — verifies the application is ready to serve traffic.
///
/// Checks:
/// - In-memory stores are accessible (read lock acquirable).
/// - Database connection is healthy (when configured).
///
/// Returns 200 "ready" or 503 with a diagnostic message.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let _ = state.forms.len();
    let _ = state.routes.len();
    let _ = state.applications.len();
    let _ = state.folders.len();
    let _ = state.documents.len();

    if let Some(pool) = &state.db {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
