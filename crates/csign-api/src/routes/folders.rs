//! # Folder and Document API
//!
//! Folders are the target containers that approved applications file
//! their output documents into. Documents themselves have no create
//! endpoint; the approve handler files them.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use csign_core::{DocumentId, FolderId};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::{AppState, DocumentRecord, FolderRecord};

/// Request to create a folder.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

impl Validate for CreateFolderRequest {
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

/// Build the folders and documents router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/folders", get(list_folders).post(create_folder))
        .route("/v1/folders/:id", get(get_folder).delete(delete_folder))
        .route("/v1/folders/:id/documents", get(list_folder_documents))
        .route("/v1/documents/:id", get(get_document))
}

/// POST /v1/folders — Create a folder.
#[utoipa::path(
    post,
    path = "/v1/folders",
    request_body = CreateFolderRequest,
    responses(
        (status = 201, description = "Folder created"),
        (status = 404, description = "Parent folder not found", body = crate::error::ErrorBody),
    ),
    tag = "folders"
)]
pub(crate) async fn create_folder(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateFolderRequest>, JsonRejection>,
) -> Result<(axum::http::StatusCode, Json<FolderRecord>), AppError> {
    let req = extract_validated_json(body)?;

    let parent_id = match req.parent_id {
        Some(raw) => {
            let parent_id = FolderId::from_uuid(raw);
            if !state.folders.contains(&parent_id) {
                return Err(AppError::NotFound(format!("folder {raw} not found")));
            }
            Some(parent_id)
        }
        None => None,
    };

    let folder = FolderRecord {
        id: FolderId::new(),
        name: req.name,
        parent_id,
        created_by: caller.user_id,
        created_at: Utc::now(),
    };

    state.folders.insert(folder.id, folder.clone());

    if let Some(pool) = &state.db {
        if let Err(e) = crate::db::folders::insert(pool, &folder).await {
            tracing::error!(folder_id = %folder.id, error = %e, "failed to persist folder to database");
            return Err(AppError::Internal(
                "folder recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok((axum::http::StatusCode::CREATED, Json(folder)))
}

/// GET /v1/folders — List all folders.
#[utoipa::path(
    get,
    path = "/v1/folders",
    responses(
        (status = 200, description = "Folders, newest first"),
    ),
    tag = "folders"
)]
pub(crate) async fn list_folders(State(state): State<AppState>) -> Json<Vec<FolderRecord>> {
    let mut folders = state.folders.list();
    folders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(folders)
}

/// GET /v1/folders/:id — Get a folder.
#[utoipa::path(
    get,
    path = "/v1/folders/{id}",
    params(("id" = Uuid, Path, description = "Folder ID")),
    responses(
        (status = 200, description = "Folder found"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "folders"
)]
pub(crate) async fn get_folder(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FolderRecord>, AppError> {
    let folder = state
        .folders
        .get(&FolderId::from_uuid(id))
        .ok_or_else(|| AppError::NotFound(format!("folder {id} not found")))?;
    Ok(Json(folder))
}

/// DELETE /v1/folders/:id — Delete an empty folder.
#[utoipa::path(
    delete,
    path = "/v1/folders/{id}",
    params(("id" = Uuid, Path, description = "Folder ID")),
    responses(
        (status = 204, description = "Folder deleted"),
        (status = 403, description = "Not the creator", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Folder still holds documents or child folders", body = crate::error::ErrorBody),
    ),
    tag = "folders"
)]
pub(crate) async fn delete_folder(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    let folder_id = FolderId::from_uuid(id);

    let has_documents = !state
        .documents
        .list_where(|d| d.folder_id == folder_id)
        .is_empty();
    let has_children = !state
        .folders
        .list_where(|f| f.parent_id == Some(folder_id))
        .is_empty();
    if has_documents || has_children {
        return Err(AppError::Conflict(format!("folder {id} is not empty")));
    }

    state
        .folders
        .try_remove(&folder_id, |folder| {
            if !caller.is_admin() && folder.created_by != caller.user_id {
                return Err(AppError::Forbidden(
                    "only the creator or an admin may delete a folder".to_string(),
                ));
            }
            Ok(())
        })
        .ok_or_else(|| AppError::NotFound(format!("folder {id} not found")))??;

    if let Some(pool) = &state.db {
        if let Err(e) = crate::db::folders::delete(pool, folder_id).await {
            tracing::error!(folder_id = %id, error = %e, "failed to persist folder deletion to database");
            return Err(AppError::Internal(
                "folder removed in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// GET /v1/folders/:id/documents — List a folder's documents.
#[utoipa::path(
    get,
    path = "/v1/folders/{id}/documents",
    params(("id" = Uuid, Path, description = "Folder ID")),
    responses(
        (status = 200, description = "Documents in the folder, newest first"),
        (status = 404, description = "Folder not found", body = crate::error::ErrorBody),
    ),
    tag = "folders"
)]
pub(crate) async fn list_folder_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DocumentRecord>>, AppError> {
    let folder_id = FolderId::from_uuid(id);
    if !state.folders.contains(&folder_id) {
        return Err(AppError::NotFound(format!("folder {id} not found")));
    }

    let mut documents = state.documents.list_where(|d| d.folder_id == folder_id);
    documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(documents))
}

/// GET /v1/documents/:id — Get a filed document.
#[utoipa::path(
    get,
    path = "/v1/documents/{id}",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document found"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "folders"
)]
pub(crate) async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentRecord>, AppError> {
    let document = state
        .documents
        .get(&DocumentId::from_uuid(id))
        .ok_or_else(|| AppError::NotFound(format!("document {id} not found")))?;
    Ok(Json(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use csign_core::UserId;

    fn user() -> CallerIdentity {
        CallerIdentity {
            user_id: UserId::new(),
            role: Role::User,
        }
    }

    #[test]
    fn test_create_folder_request_empty_name() {
        let req = CreateFolderRequest {
            name: "".to_string(),
            parent_id: None,
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

    fn post_folder(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/folders")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn handler_create_and_get_folder() {
        let state = AppState::in_memory();
        let app = test_app_as(state.clone(), user());

        let resp = app
            .clone()
            .oneshot(post_folder(r#"{"name": "Contracts"}"#.to_string()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let folder: FolderRecord = body_json(resp).await;
        assert_eq!(folder.name, "Contracts");

        let req = Request::builder()
            .method("GET")
            .uri(format!("/v1/folders/{}", folder.id.as_uuid()))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn handler_create_folder_unknown_parent_returns_404() {
        let app = test_app_as(AppState::in_memory(), user());
        let body = format!(r#"{{"name": "Nested", "parent_id": "{}"}}"#, Uuid::new_v4());
        let resp = app.oneshot(post_folder(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn handler_delete_folder_with_documents_returns_409() {
        let state = AppState::in_memory();
        let app = test_app_as(state.clone(), user());

        let resp = app
            .clone()
            .oneshot(post_folder(r#"{"name": "Archive"}"#.to_string()))
            .await
            .unwrap();
        let folder: FolderRecord = body_json(resp).await;

        let document = DocumentRecord {
            id: DocumentId::new(),
            name: "Approved expense".to_string(),
            folder_id: folder.id,
            metadata: serde_json::json!({}),
            created_by: UserId::new(),
            created_at: Utc::now(),
        };
        state.documents.insert(document.id, document);

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/v1/folders/{}", folder.id.as_uuid()))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert!(state.folders.contains(&folder.id));
    }

    #[tokio::test]
    async fn handler_delete_folder_with_child_folder_returns_409() {
        let state = AppState::in_memory();
        let app = test_app_as(state.clone(), user());

        let resp = app
            .clone()
            .oneshot(post_folder(r#"{"name": "Top"}"#.to_string()))
            .await
            .unwrap();
        let parent: FolderRecord = body_json(resp).await;

        let body = format!(
            r#"{{"name": "Child", "parent_id": "{}"}}"#,
            parent.id.as_uuid()
        );
        let resp = app.clone().oneshot(post_folder(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/v1/folders/{}", parent.id.as_uuid()))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn handler_delete_empty_folder_by_non_creator_returns_403() {
        let state = AppState::in_memory();
        let app = test_app_as(state.clone(), user());

        let resp = app
            .oneshot(post_folder(r#"{"name": "Mine"}"#.to_string()))
            .await
            .unwrap();
        let folder: FolderRecord = body_json(resp).await;

        let other_app = test_app_as(state, user());
        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/v1/folders/{}", folder.id.as_uuid()))
            .body(Body::empty())
            .unwrap();
        let resp = other_app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn handler_list_folder_documents() {
        let state = AppState::in_memory();
        let app = test_app_as(state.clone(), user());

        let resp = app
            .clone()
            .oneshot(post_folder(r#"{"name": "Reports"}"#.to_string()))
            .await
            .unwrap();
        let folder: FolderRecord = body_json(resp).await;

        for name in ["first", "second"] {
            let document = DocumentRecord {
                id: DocumentId::new(),
                name: name.to_string(),
                folder_id: folder.id,
                metadata: serde_json::json!({}),
                created_by: UserId::new(),
                created_at: Utc::now(),
            };
            state.documents.insert(document.id, document);
        }

        let req = Request::builder()
            .method("GET")
            .uri(format!("/v1/folders/{}/documents", folder.id.as_uuid()))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let documents: Vec<DocumentRecord> = body_json(resp).await;
        assert_eq!(documents.len(), 2);
    }

    #[tokio::test]
    async fn handler_get_document_not_found_returns_404() {
        let app = test_app_as(AppState::in_memory(), user());
        let req = Request::builder()
            .method("GET")
            .uri(format!("/v1/documents/{}", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
