//! # Approval Form Registry API
//!
//! CRUD over form definitions. Any authenticated caller may create
//! and read; update and delete are restricted to the creator or an
//! admin. Deleting a form that a non-DRAFT application references is
//! a conflict.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use csign_core::{FolderId, FormId};
use csign_engine::{ApprovalForm, ApprovalStatus, FieldType, FormField};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// One field in a form definition request. Field ids are assigned
/// server-side.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FieldInput {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    #[schema(value_type = String)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub order: u32,
}

impl FieldInput {
    fn into_field(self) -> FormField {
        FormField {
            id: Uuid::new_v4(),
            name: self.name,
            label: self.label,
            field_type: self.field_type,
            required: self.required,
            options: self.options,
            order: self.order,
        }
    }
}

/// Request to create a form definition.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFormRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldInput>,
    #[serde(default)]
    pub target_folder_id: Option<Uuid>,
}

impl Validate for CreateFormRequest {
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

/// Request to update a form definition. Absent fields are unchanged.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFormRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<FieldInput>>,
    #[serde(default)]
    pub target_folder_id: Option<Uuid>,
}

impl Validate for UpdateFormRequest {
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

/// Build the approval forms router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/approval-forms", get(list_forms).post(create_form))
        .route(
            "/v1/approval-forms/:id",
            get(get_form).put(update_form).delete(delete_form),
        )
}

/// POST /v1/approval-forms — Create a form definition.
#[utoipa::path(
    post,
    path = "/v1/approval-forms",
    request_body = CreateFormRequest,
    responses(
        (status = 201, description = "Form created"),
        (status = 422, description = "Invalid field schema", body = crate::error::ErrorBody),
    ),
    tag = "approval_forms"
)]
pub(crate) async fn create_form(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateFormRequest>, JsonRejection>,
) -> Result<(axum::http::StatusCode, Json<ApprovalForm>), AppError> {
    let req = extract_validated_json(body)?;

    let fields = req.fields.into_iter().map(FieldInput::into_field).collect();
    let form = ApprovalForm::new(
        req.name,
        req.description,
        fields,
        caller.user_id,
        req.target_folder_id.map(FolderId::from_uuid),
    )?;

    state.forms.insert(form.id, form.clone());

    // Persist to database (write-through). Failure is surfaced to the
    // client because the in-memory record would be lost on restart.
    if let Some(pool) = &state.db {
        if let Err(e) = crate::db::forms::insert(pool, &form).await {
            tracing::error!(form_id = %form.id, error = %e, "failed to persist form to database");
            return Err(AppError::Internal(
                "form recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok((axum::http::StatusCode::CREATED, Json(form)))
}

/// GET /v1/approval-forms — List all form definitions.
#[utoipa::path(
    get,
    path = "/v1/approval-forms",
    responses(
        (status = 200, description = "Form definitions, newest first"),
    ),
    tag = "approval_forms"
)]
pub(crate) async fn list_forms(State(state): State<AppState>) -> Json<Vec<ApprovalForm>> {
    let mut forms = state.forms.list();
    forms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(forms)
}

/// GET /v1/approval-forms/:id — Get a form definition.
#[utoipa::path(
    get,
    path = "/v1/approval-forms/{id}",
    params(("id" = Uuid, Path, description = "Form ID")),
    responses(
        (status = 200, description = "Form found"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "approval_forms"
)]
pub(crate) async fn get_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApprovalForm>, AppError> {
    let form = state
        .forms
        .get(&FormId::from_uuid(id))
        .ok_or_else(|| AppError::NotFound(format!("form {id} not found")))?;
    Ok(Json(form))
}

/// PUT /v1/approval-forms/:id — Update a form definition.
#[utoipa::path(
    put,
    path = "/v1/approval-forms/{id}",
    params(("id" = Uuid, Path, description = "Form ID")),
    request_body = UpdateFormRequest,
    responses(
        (status = 200, description = "Form updated"),
        (status = 403, description = "Not the creator", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "approval_forms"
)]
pub(crate) async fn update_form(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateFormRequest>, JsonRejection>,
) -> Result<Json<ApprovalForm>, AppError> {
    let req = extract_validated_json(body)?;
    let form_id = FormId::from_uuid(id);

    let (form, _) = state
        .forms
        .try_update(&form_id, |form| {
            if !caller.is_admin() && form.created_by != caller.user_id {
                return Err(AppError::Forbidden(
                    "only the creator or an admin may update a form".to_string(),
                ));
            }
            if let Some(name) = req.name {
                form.name = name;
            }
            if let Some(description) = req.description {
                form.description = Some(description);
            }
            if let Some(target) = req.target_folder_id {
                form.target_folder_id = Some(FolderId::from_uuid(target));
            }
            match req.fields {
                Some(fields) => {
                    let fields = fields.into_iter().map(FieldInput::into_field).collect();
                    form.set_fields(fields)?;
                }
                None => form.updated_at = chrono::Utc::now(),
            }
            Ok(())
        })
        .ok_or_else(|| AppError::NotFound(format!("form {id} not found")))??;

    if let Some(pool) = &state.db {
        if let Err(e) = crate::db::forms::update(pool, &form).await {
            tracing::error!(form_id = %form.id, error = %e, "failed to persist form update to database");
            return Err(AppError::Internal(
                "form updated in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok(Json(form))
}

/// DELETE /v1/approval-forms/:id — Delete a form definition.
#[utoipa::path(
    delete,
    path = "/v1/approval-forms/{id}",
    params(("id" = Uuid, Path, description = "Form ID")),
    responses(
        (status = 204, description = "Form deleted"),
        (status = 403, description = "Not the creator", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Referenced by a submitted application", body = crate::error::ErrorBody),
    ),
    tag = "approval_forms"
)]
pub(crate) async fn delete_form(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    let form_id = FormId::from_uuid(id);

    // Drafts referencing the form merely become orphaned; anything
    // already in the pipeline pins the definition.
    let referenced = !state
        .applications
        .list_where(|a| a.form_id == form_id && a.status != ApprovalStatus::Draft)
        .is_empty();
    if referenced {
        return Err(AppError::Conflict(format!(
            "form {id} is referenced by submitted applications"
        )));
    }

    let removed = state
        .forms
        .try_remove(&form_id, |form| {
            if !caller.is_admin() && form.created_by != caller.user_id {
                return Err(AppError::Forbidden(
                    "only the creator or an admin may delete a form".to_string(),
                ));
            }
            Ok(())
        })
        .ok_or_else(|| AppError::NotFound(format!("form {id} not found")))??;

    // A submit can slip in between the reference check and the
    // removal; if one did, reinstate the definition and report the
    // conflict.
    let now_referenced = !state
        .applications
        .list_where(|a| a.form_id == form_id && a.status != ApprovalStatus::Draft)
        .is_empty();
    if now_referenced {
        state.forms.insert(form_id, removed);
        return Err(AppError::Conflict(format!(
            "form {id} is referenced by submitted applications"
        )));
    }

    if let Some(pool) = &state.db {
        if let Err(e) = crate::db::forms::delete(pool, form_id).await {
            tracing::error!(form_id = %id, error = %e, "failed to persist form deletion to database");
            return Err(AppError::Internal(
                "form removed in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok(axum::http::StatusCode::NO_CONTENT)
}
