//! # Approval Route Registry API
//!
//! CRUD over route definitions (ordered approver steps). Editing a
//! route never affects applications already in flight — they carry
//! their own snapshot of the step sequence.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use csign_core::{RouteId, UserId};
use csign_engine::{ApprovalRoute, ApprovalStatus, RouteStep};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// One step in a route definition request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StepInput {
    pub step_number: u32,
    pub approver_id: Uuid,
}

impl StepInput {
    fn into_step(self) -> RouteStep {
        RouteStep {
            step_number: self.step_number,
            approver_id: UserId::from_uuid(self.approver_id),
        }
    }
}

/// Request to create a route definition.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRouteRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<StepInput>,
}

impl Validate for CreateRouteRequest {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.name.len() > 255 {
            return Err("name must not exceed 255 characters".to_string());
        }
        Ok(())
    }
}

/// Request to update a route definition. Absent fields are unchanged.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRouteRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Option<Vec<StepInput>>,
}

impl Validate for UpdateRouteRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err("name must not be empty".to_string());
            }
            if name.len() > 255 {
                return Err("name must not exceed 255 characters".to_string());
            }
        }
        Ok(())
    }
}

/// Build the approval routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/approval-routes", get(list_routes).post(create_route))
        .route(
            "/v1/approval-routes/:id",
            get(get_route).put(update_route).delete(delete_route),
        )
}

/// POST /v1/approval-routes — Create a route definition.
#[utoipa::path(
    post,
    path = "/v1/approval-routes",
    request_body = CreateRouteRequest,
    responses(
        (status = 201, description = "Route created"),
        (status = 422, description = "Invalid step sequence", body = crate::error::ErrorBody),
    ),
    tag = "approval_routes"
)]
pub(crate) async fn create_route(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateRouteRequest>, JsonRejection>,
) -> Result<(axum::http::StatusCode, Json<ApprovalRoute>), AppError> {
    let req = extract_validated_json(body)?;

    let steps = req.steps.into_iter().map(StepInput::into_step).collect();
    let route = ApprovalRoute::new(req.name, req.description, steps, caller.user_id)?;

    state.routes.insert(route.id, route.clone());

    if let Some(pool) = &state.db {
        if let Err(e) = crate::db::routes::insert(pool, &route).await {
            tracing::error!(route_id = %route.id, error = %e, "failed to persist route to database");
            return Err(AppError::Internal(
                "route recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok((axum::http::StatusCode::CREATED, Json(route)))
}

/// GET /v1/approval-routes — List all route definitions.
#[utoipa::path(
    get,
    path = "/v1/approval-routes",
    responses(
        (status = 200, description = "Route definitions, newest first"),
    ),
    tag = "approval_routes"
)]
pub(crate) async fn list_routes(State(state): State<AppState>) -> Json<Vec<ApprovalRoute>> {
    let mut routes = state.routes.list();
    routes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(routes)
}

/// GET /v1/approval-routes/:id — Get a route definition.
#[utoipa::path(
    get,
    path = "/v1/approval-routes/{id}",
    params(("id" = Uuid, Path, description = "Route ID")),
    responses(
        (status = 200, description = "Route found"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "approval_routes"
)]
pub(crate) async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApprovalRoute>, AppError> {
    let route = state
        .routes
        .get(&RouteId::from_uuid(id))
        .ok_or_else(|| AppError::NotFound(format!("route {id} not found")))?;
    Ok(Json(route))
}

/// PUT /v1/approval-routes/:id — Update a route definition.
#[utoipa::path(
    put,
    path = "/v1/approval-routes/{id}",
    params(("id" = Uuid, Path, description = "Route ID")),
    request_body = UpdateRouteRequest,
    responses(
        (status = 200, description = "Route updated"),
        (status = 403, description = "Not the creator", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "approval_routes"
)]
pub(crate) async fn update_route(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateRouteRequest>, JsonRejection>,
) -> Result<Json<ApprovalRoute>, AppError> {
    let req = extract_validated_json(body)?;
    let route_id = RouteId::from_uuid(id);

    let (route, _) = state
        .routes
        .try_update(&route_id, |route| {
            if !caller.is_admin() && route.created_by != caller.user_id {
                return Err(AppError::Forbidden(
                    "only the creator or an admin may update a route".to_string(),
                ));
            }
            if let Some(name) = req.name {
                route.name = name;
            }
            if let Some(description) = req.description {
                route.description = Some(description);
            }
            match req.steps {
                Some(steps) => {
                    let steps = steps.into_iter().map(StepInput::into_step).collect();
                    route.set_steps(steps)?;
                }
                None => route.updated_at = chrono::Utc::now(),
            }
            Ok(())
        })
        .ok_or_else(|| AppError::NotFound(format!("route {id} not found")))??;

    if let Some(pool) = &state.db {
        if let Err(e) = crate::db::routes::update(pool, &route).await {
            tracing::error!(route_id = %route.id, error = %e, "failed to persist route update to database");
            return Err(AppError::Internal(
                "route updated in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok(Json(route))
}

/// DELETE /v1/approval-routes/:id — Delete a route definition.
#[utoipa::path(
    delete,
    path = "/v1/approval-routes/{id}",
    params(("id" = Uuid, Path, description = "Route ID")),
    responses(
        (status = 204, description = "Route deleted"),
        (status = 403, description = "Not the creator", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Referenced by a submitted application", body = crate::error::ErrorBody),
    ),
    tag = "approval_routes"
)]
pub(crate) async fn delete_route(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    let route_id = RouteId::from_uuid(id);

    let referenced = !state
        .applications
        .list_where(|a| a.route_id == route_id && a.status != ApprovalStatus::Draft)
        .is_empty();
    if referenced {
        return Err(AppError::Conflict(format!(
            "route {id} is referenced by submitted applications"
        )));
    }

    let removed = state
        .routes
        .try_remove(&route_id, |route| {
            if !caller.is_admin() && route.created_by != caller.user_id {
                return Err(AppError::Forbidden(
                    "only the creator or an admin may delete a route".to_string(),
                ));
            }
            Ok(())
        })
        .ok_or_else(|| AppError::NotFound(format!("route {id} not found")))??;

    // A submit can slip in between the reference check and the
    // removal; if one did, reinstate the definition and report the
    // conflict.
    let now_referenced = !state
        .applications
        .list_where(|a| a.route_id == route_id && a.status != ApprovalStatus::Draft)
        .is_empty();
    if now_referenced {
        state.routes.insert(route_id, removed);
        return Err(AppError::Conflict(format!(
            "route {id} is referenced by submitted applications"
        )));
    }

    if let Some(pool) = &state.db {
        if let Err(e) = crate::db::routes::delete(pool, route_id).await {
            tracing::error!(route_id = %id, error = %e, "failed to persist route deletion to database");
            return Err(AppError::Internal(
                "route removed in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use csign_engine::{Application, ApprovalForm};

    fn user() -> CallerIdentity {
        CallerIdentity {
            user_id: UserId::new(),
            role: Role::User,
        }
    }

    #[test]
    fn test_create_route_request_empty_name() {
        let req = CreateRouteRequest {
            name: "".to_string(),
            description: None,
            steps: vec![],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_router_builds_successfully() {
        let _router = router();
    }

    // ── Handler integration tests ─────────────────────────────────

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app_as(state: AppState, caller: CallerIdentity) -> Router<()> {
        router()
            .layer(axum::Extension(caller))
            .with_state(state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_route(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/approval-routes")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn two_step_body() -> String {
        format!(
            r#"{{"name": "Manager then Finance", "steps": [
                {{"step_number": 1, "approver_id": "{}"}},
                {{"step_number": 2, "approver_id": "{}"}}
            ]}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        )
    }

    #[tokio::test]
    async fn handler_create_route_returns_201() {
        let app = test_app_as(AppState::in_memory(), user());
        let resp = app.oneshot(post_route(two_step_body())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let route: ApprovalRoute = body_json(resp).await;
        assert_eq!(route.step_count(), 2);
    }

    #[tokio::test]
    async fn handler_create_route_without_steps_returns_422() {
        let app = test_app_as(AppState::in_memory(), user());
        let resp = app
            .oneshot(post_route(r#"{"name": "Empty", "steps": []}"#.to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn handler_create_route_with_gapped_steps_returns_422() {
        let app = test_app_as(AppState::in_memory(), user());
        let body = format!(
            r#"{{"name": "Gapped", "steps": [
                {{"step_number": 1, "approver_id": "{}"}},
                {{"step_number": 3, "approver_id": "{}"}}
            ]}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let resp = app.oneshot(post_route(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn handler_create_route_with_duplicate_steps_returns_422() {
        let app = test_app_as(AppState::in_memory(), user());
        let body = format!(
            r#"{{"name": "Duplicated", "steps": [
                {{"step_number": 1, "approver_id": "{}"}},
                {{"step_number": 1, "approver_id": "{}"}}
            ]}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let resp = app.oneshot(post_route(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn handler_update_route_steps_by_creator_returns_200() {
        let state = AppState::in_memory();
        let app = test_app_as(state.clone(), user());

        let resp = app.clone().oneshot(post_route(two_step_body())).await.unwrap();
        let route: ApprovalRoute = body_json(resp).await;

        let body = format!(
            r#"{{"steps": [{{"step_number": 1, "approver_id": "{}"}}]}}"#,
            Uuid::new_v4()
        );
        let req = Request::builder()
            .method("PUT")
            .uri(format!("/v1/approval-routes/{}", route.id.as_uuid()))
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: ApprovalRoute = body_json(resp).await;
        assert_eq!(updated.step_count(), 1);
    }

    #[tokio::test]
    async fn handler_update_route_by_non_creator_returns_403() {
        let state = AppState::in_memory();
        let app = test_app_as(state.clone(), user());

        let resp = app.oneshot(post_route(two_step_body())).await.unwrap();
        let route: ApprovalRoute = body_json(resp).await;

        let other_app = test_app_as(state, user());
        let req = Request::builder()
            .method("PUT")
            .uri(format!("/v1/approval-routes/{}", route.id.as_uuid()))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name": "Hijacked"}"#))
            .unwrap();
        let resp = other_app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn handler_delete_route_referenced_by_pending_application_returns_409() {
        let state = AppState::in_memory();
        let app = test_app_as(state.clone(), user());

        let resp = app.clone().oneshot(post_route(two_step_body())).await.unwrap();
        let route: ApprovalRoute = body_json(resp).await;

        let form =
            ApprovalForm::new("Leave Request".to_string(), None, vec![], UserId::new(), None)
                .unwrap();
        let applicant = UserId::new();
        let mut application =
            Application::draft(&form, &route, applicant, serde_json::json!({}));
        application.submit(applicant, &form, &route).unwrap();
        state.applications.insert(application.id, application);

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/v1/approval-routes/{}", route.id.as_uuid()))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert!(state.routes.contains(&route.id));
    }

    #[tokio::test]
    async fn handler_delete_unreferenced_route_returns_204() {
        let state = AppState::in_memory();
        let app = test_app_as(state.clone(), user());

        let resp = app.clone().oneshot(post_route(two_step_body())).await.unwrap();
        let route: ApprovalRoute = body_json(resp).await;

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/v1/approval-routes/{}", route.id.as_uuid()))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(state.routes.is_empty());
    }
}
