//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Service bearer token. Set via CSIGN_AUTH_TOKEN env var.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Countersign API",
        version = "0.3.0",
        description = "Multi-step approval workflow engine.\n\nProvides:\n- **Approval form registry** — ordered field schemas with structural validation\n- **Approval route registry** — ordered approver step sequences\n- **Application lifecycle** — DRAFT → PENDING → APPROVED/REJECTED with per-step decision history\n- **Approval queues** — per-caller submitted and awaiting-decision listings\n- **Folders and documents** — output documents filed automatically on final approval\n\nAuthentication: service bearer token via `Authorization: Bearer <token>` plus trusted `x-caller-id`/`x-caller-role` headers from the fronting gateway. All `/v1/*` endpoints require authentication. Health probes (`/health/*`) are unauthenticated.",
        license(name = "BUSL-1.1")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Approval forms ───────────────────────────────────────────────
        crate::routes::approval_forms::create_form,
        crate::routes::approval_forms::list_forms,
        crate::routes::approval_forms::get_form,
        crate::routes::approval_forms::update_form,
        crate::routes::approval_forms::delete_form,
        // ── Approval routes ──────────────────────────────────────────────
        crate::routes::approval_routes::create_route,
        crate::routes::approval_routes::list_routes,
        crate::routes::approval_routes::get_route,
        crate::routes::approval_routes::update_route,
        crate::routes::approval_routes::delete_route,
        // ── Applications ─────────────────────────────────────────────────
        crate::routes::applications::create_application,
        crate::routes::applications::list_own_applications,
        crate::routes::applications::list_for_approval,
        crate::routes::applications::get_application,
        crate::routes::applications::update_application,
        crate::routes::applications::delete_application,
        crate::routes::applications::submit_application,
        crate::routes::applications::approve_application,
        crate::routes::applications::reject_application,
        // ── Folders and documents ────────────────────────────────────────
        crate::routes::folders::create_folder,
        crate::routes::folders::list_folders,
        crate::routes::folders::get_folder,
        crate::routes::folders::delete_folder,
        crate::routes::folders::list_folder_documents,
        crate::routes::folders::get_document,
    ),
    components(
        schemas(
            // ── Error types ─────────────────────────────────────────────
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            // ── Form DTOs ───────────────────────────────────────────────
            crate::routes::approval_forms::FieldInput,
            crate::routes::approval_forms::CreateFormRequest,
            crate::routes::approval_forms::UpdateFormRequest,
            // ── Route DTOs ──────────────────────────────────────────────
            crate::routes::approval_routes::StepInput,
            crate::routes::approval_routes::CreateRouteRequest,
            crate::routes::approval_routes::UpdateRouteRequest,
            // ── Application DTOs ────────────────────────────────────────
            crate::routes::applications::CreateApplicationRequest,
            crate::routes::applications::UpdateApplicationRequest,
            crate::routes::applications::ActionRequest,
            // ── Folder DTOs ─────────────────────────────────────────────
            crate::routes::folders::CreateFolderRequest,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "approval_forms", description = "Approval form registry — ordered field schemas"),
        (name = "approval_routes", description = "Approval route registry — ordered approver steps"),
        (name = "applications", description = "Application lifecycle — drafting, submission, approval, rejection"),
        (name = "folders", description = "Folders and the documents filed on final approval"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates_successfully() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Countersign API");
    }

    #[test]
    fn test_openapi_spec_has_lifecycle_paths() {
        let spec = ApiDoc::openapi();
        for path in &[
            "/v1/approval-forms",
            "/v1/approval-forms/{id}",
            "/v1/approval-routes",
            "/v1/applications",
            "/v1/applications/for-approval",
            "/v1/applications/submit",
            "/v1/applications/approve",
            "/v1/applications/reject",
            "/v1/folders",
            "/v1/documents/{id}",
        ] {
            assert!(
                spec.paths.paths.contains_key(*path),
                "should contain {path}"
            );
        }
    }

    #[test]
    fn test_openapi_spec_has_components() {
        let spec = ApiDoc::openapi();
        let schemas = &spec.components.as_ref().unwrap().schemas;
        for name in &[
            "CreateFormRequest",
            "CreateRouteRequest",
            "CreateApplicationRequest",
            "ActionRequest",
            "ErrorBody",
        ] {
            assert!(schemas.contains_key(*name), "should contain {name} schema");
        }
    }

    #[test]
    fn test_openapi_spec_has_security_scheme() {
        let spec = ApiDoc::openapi();
        let components = spec.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_spec_serializes_to_json() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("openapi"));
        assert!(json.contains("bearer_auth"));
    }

    #[test]
    fn test_router_builds_successfully() {
        let _router = router();
    }
}
