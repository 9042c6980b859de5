//! # Application Lifecycle API
//!
//! Drafting, submission, and decision endpoints, plus the caller's
//! queues. All transition endpoints go through `Store::try_update`,
//! so a lost race surfaces as a 409 instead of double-applying a
//! decision. Final approval files an output document when the form
//! names a target folder.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use csign_core::{ApplicationId, DocumentId, FormId, RouteId};
use csign_engine::{Application, ApproveOutcome};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::{AppState, DocumentRecord};

const MAX_COMMENT_LEN: usize = 2000;

/// Request to create a draft application.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateApplicationRequest {
    pub form_id: Uuid,
    pub route_id: Uuid,
    /// Initial field values. Drafts may be partial; required-field
    /// checking happens at submission.
    #[serde(default)]
    pub form_data: Option<serde_json::Value>,
}

impl Validate for CreateApplicationRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(data) = &self.form_data {
            if !data.is_object() {
                return Err("form_data must be a JSON object".to_string());
            }
        }
        Ok(())
    }
}

/// Request to replace a draft's field values.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateApplicationRequest {
    pub form_data: serde_json::Value,
}

impl Validate for UpdateApplicationRequest {
    fn validate(&self) -> Result<(), String> {
        if !self.form_data.is_object() {
            return Err("form_data must be a JSON object".to_string());
        }
        Ok(())
    }
}

/// Request body shared by the submit/approve/reject endpoints.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ActionRequest {
    pub application_id: Uuid,
    /// Free text recorded verbatim in the decision history.
    #[serde(default)]
    pub comment: Option<String>,
}

impl Validate for ActionRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(comment) = &self.comment {
            if comment.len() > MAX_COMMENT_LEN {
                return Err(format!("comment must not exceed {MAX_COMMENT_LEN} characters"));
            }
        }
        Ok(())
    }
}

/// Build the applications router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/applications",
            get(list_own_applications).post(create_application),
        )
        .route("/v1/applications/for-approval", get(list_for_approval))
        .route(
            "/v1/applications/:id",
            get(get_application)
                .put(update_application)
                .delete(delete_application),
        )
        .route("/v1/applications/submit", post(submit_application))
        .route("/v1/applications/approve", post(approve_application))
        .route("/v1/applications/reject", post(reject_application))
}

/// POST /v1/applications — Create a draft application.
#[utoipa::path(
    post,
    path = "/v1/applications",
    request_body = CreateApplicationRequest,
    responses(
        (status = 201, description = "Draft created"),
        (status = 404, description = "Form or route not found", body = crate::error::ErrorBody),
    ),
    tag = "applications"
)]
pub(crate) async fn create_application(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateApplicationRequest>, JsonRejection>,
) -> Result<(axum::http::StatusCode, Json<Application>), AppError> {
    let req = extract_validated_json(body)?;

    let form_id = FormId::from_uuid(req.form_id);
    let route_id = RouteId::from_uuid(req.route_id);
    let form = state
        .forms
        .get(&form_id)
        .ok_or_else(|| AppError::NotFound(format!("form {} not found", req.form_id)))?;
    let route = state
        .routes
        .get(&route_id)
        .ok_or_else(|| AppError::NotFound(format!("route {} not found", req.route_id)))?;

    let form_data = req.form_data.unwrap_or_else(|| serde_json::json!({}));
    let application = Application::draft(&form, &route, caller.user_id, form_data);

    state
        .applications
        .insert(application.id, application.clone());

    if let Some(pool) = &state.db {
        if let Err(e) = crate::db::applications::insert(pool, &application).await {
            tracing::error!(application_id = %application.id, error = %e, "failed to persist application to database");
            return Err(AppError::Internal(
                "application recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok((axum::http::StatusCode::CREATED, Json(application)))
}

/// GET /v1/applications — List the caller's own applications.
#[utoipa::path(
    get,
    path = "/v1/applications",
    responses(
        (status = 200, description = "The caller's applications, newest first"),
    ),
    tag = "applications"
)]
pub(crate) async fn list_own_applications(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Json<Vec<Application>> {
    let mut apps = state
        .applications
        .list_where(|a| a.applicant_id == caller.user_id);
    apps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(apps)
}

/// GET /v1/applications/for-approval — The caller's approval queue.
///
/// PENDING applications whose active step is bound to the caller in
/// the submission-time snapshot.
#[utoipa::path(
    get,
    path = "/v1/applications/for-approval",
    responses(
        (status = 200, description = "Applications awaiting the caller's decision, newest first"),
    ),
    tag = "applications"
)]
pub(crate) async fn list_for_approval(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Json<Vec<Application>> {
    let mut apps = state
        .applications
        .list_where(|a| a.active_approver() == Some(caller.user_id));
    apps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(apps)
}

/// GET /v1/applications/:id — Get an application.
#[utoipa::path(
    get,
    path = "/v1/applications/{id}",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application found"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "applications"
)]
pub(crate) async fn get_application(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Application>, AppError> {
    let app = state
        .applications
        .get(&ApplicationId::from_uuid(id))
        .ok_or_else(|| AppError::NotFound(format!("application {id} not found")))?;

    let visible = caller.is_admin()
        || app.applicant_id == caller.user_id
        || app.names_approver(caller.user_id);
    if !visible {
        // 404 instead of 403 to prevent UUID enumeration.
        return Err(AppError::NotFound(format!("application {id} not found")));
    }

    Ok(Json(app))
}

/// PUT /v1/applications/:id — Replace a draft's field values.
#[utoipa::path(
    put,
    path = "/v1/applications/{id}",
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = UpdateApplicationRequest,
    responses(
        (status = 200, description = "Draft updated"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Not an editable draft of the caller", body = crate::error::ErrorBody),
    ),
    tag = "applications"
)]
pub(crate) async fn update_application(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateApplicationRequest>, JsonRejection>,
) -> Result<Json<Application>, AppError> {
    let req = extract_validated_json(body)?;
    let app_id = ApplicationId::from_uuid(id);

    let (app, _) = state
        .applications
        .try_update(&app_id, |app| {
            app.update_form_data(caller.user_id, req.form_data)
        })
        .ok_or_else(|| AppError::NotFound(format!("application {id} not found")))?
        .map_err(AppError::from)?;

    persist_update(&state, &app).await?;
    Ok(Json(app))
}

/// DELETE /v1/applications/:id — Delete a draft.
#[utoipa::path(
    delete,
    path = "/v1/applications/{id}",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 204, description = "Draft deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Not an editable draft of the caller", body = crate::error::ErrorBody),
    ),
    tag = "applications"
)]
pub(crate) async fn delete_application(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    let app_id = ApplicationId::from_uuid(id);

    state
        .applications
        .try_remove(&app_id, |app| app.check_delete(caller.user_id))
        .ok_or_else(|| AppError::NotFound(format!("application {id} not found")))?
        .map_err(AppError::from)?;

    if let Some(pool) = &state.db {
        if let Err(e) = crate::db::applications::delete(pool, app_id).await {
            tracing::error!(application_id = %id, error = %e, "failed to persist application deletion to database");
            return Err(AppError::Internal(
                "application removed in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// POST /v1/applications/submit — Submit a draft for approval.
#[utoipa::path(
    post,
    path = "/v1/applications/submit",
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Application entered the pipeline at step 1"),
        (status = 404, description = "Application, form, or route not found", body = crate::error::ErrorBody),
        (status = 409, description = "Not a draft of the caller", body = crate::error::ErrorBody),
        (status = 422, description = "Required field missing", body = crate::error::ErrorBody),
    ),
    tag = "applications"
)]
pub(crate) async fn submit_application(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<Application>, AppError> {
    let req = extract_validated_json(body)?;
    let app_id = ApplicationId::from_uuid(req.application_id);

    // The form/route lookups run inside the same critical section as
    // the transition: an orphaned draft (its form or route was
    // deleted) cannot enter the pipeline, and a submit cannot commit
    // against a definition a concurrent delete has just removed.
    let (app, _) = state
        .applications
        .try_update(&app_id, |app| {
            let form = state.forms.get(&app.form_id).ok_or_else(|| {
                AppError::NotFound(format!("form {} no longer exists", app.form_id))
            })?;
            let route = state.routes.get(&app.route_id).ok_or_else(|| {
                AppError::NotFound(format!("route {} no longer exists", app.route_id))
            })?;
            app.submit(caller.user_id, &form, &route)
                .map_err(AppError::from)
        })
        .ok_or_else(|| AppError::NotFound(format!("application {app_id} not found")))??;

    persist_update(&state, &app).await?;
    Ok(Json(app))
}

/// POST /v1/applications/approve — Approve the active step.
#[utoipa::path(
    post,
    path = "/v1/applications/approve",
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Step approved; pipeline advanced or application approved"),
        (status = 404, description = "Application not found", body = crate::error::ErrorBody),
        (status = 409, description = "Not pending, or caller is not the active approver", body = crate::error::ErrorBody),
    ),
    tag = "applications"
)]
pub(crate) async fn approve_application(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<Application>, AppError> {
    let req = extract_validated_json(body)?;
    let app_id = ApplicationId::from_uuid(req.application_id);

    let (app, outcome) = state
        .applications
        .try_update(&app_id, |app| app.approve(caller.user_id, req.comment))
        .ok_or_else(|| AppError::NotFound(format!("application {app_id} not found")))?
        .map_err(AppError::from)?;

    persist_update(&state, &app).await?;

    if outcome == ApproveOutcome::FinalApproved {
        let app = file_output_document(&state, app).await?;
        return Ok(Json(app));
    }

    Ok(Json(app))
}

/// POST /v1/applications/reject — Reject the active step (terminal).
#[utoipa::path(
    post,
    path = "/v1/applications/reject",
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Application rejected"),
        (status = 404, description = "Application not found", body = crate::error::ErrorBody),
        (status = 409, description = "Not pending, or caller is not the active approver", body = crate::error::ErrorBody),
    ),
    tag = "applications"
)]
pub(crate) async fn reject_application(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<Application>, AppError> {
    let req = extract_validated_json(body)?;
    let app_id = ApplicationId::from_uuid(req.application_id);

    let (app, _) = state
        .applications
        .try_update(&app_id, |app| app.reject(caller.user_id, req.comment))
        .ok_or_else(|| AppError::NotFound(format!("application {app_id} not found")))?
        .map_err(AppError::from)?;

    persist_update(&state, &app).await?;
    Ok(Json(app))
}

/// Write-through persistence of a mutated application.
async fn persist_update(state: &AppState, app: &Application) -> Result<(), AppError> {
    if let Some(pool) = &state.db {
        if let Err(e) = crate::db::applications::update(pool, app).await {
            tracing::error!(application_id = %app.id, error = %e, "failed to persist application update to database");
            return Err(AppError::Internal(
                "application updated in-memory but database persist failed".to_string(),
            ));
        }
    }
    Ok(())
}

/// File the output document for a finally-approved application.
///
/// No-op when the form names no target folder or the folder has been
/// removed; the approval itself stands either way.
async fn file_output_document(
    state: &AppState,
    app: Application,
) -> Result<Application, AppError> {
    let Some(form) = state.forms.get(&app.form_id) else {
        return Ok(app);
    };
    let Some(folder_id) = form.target_folder_id else {
        return Ok(app);
    };
    if !state.folders.contains(&folder_id) {
        tracing::warn!(
            application_id = %app.id,
            folder_id = %folder_id,
            "target folder missing, approved application filed no document"
        );
        return Ok(app);
    }

    let document = DocumentRecord {
        id: DocumentId::new(),
        name: format!("{} ({})", app.form_name, app.id),
        folder_id,
        metadata: serde_json::json!({
            "application_id": app.id,
            "form_data": &app.form_data,
        }),
        created_by: app.applicant_id,
        created_at: Utc::now(),
    };

    state.documents.insert(document.id, document.clone());
    if let Some(pool) = &state.db {
        if let Err(e) = crate::db::documents::insert(pool, &document).await {
            tracing::error!(document_id = %document.id, error = %e, "failed to persist document to database");
            return Err(AppError::Internal(
                "document recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    let linked = state
        .applications
        .try_update(&app.id, |a| {
            a.attach_document(document.id);
            Ok::<(), AppError>(())
        })
        .map(|r| r.map(|(a, _)| a));
    match linked {
        Some(Ok(app)) => {
            persist_update(state, &app).await?;
            Ok(app)
        }
        _ => Ok(app),
    }
}
