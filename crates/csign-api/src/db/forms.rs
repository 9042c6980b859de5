//! Approval form persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `approval_forms`
//! table. The field schema is stored as JSONB.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use csign_core::{FolderId, FormId, UserId};
use csign_engine::ApprovalForm;

/// Insert a new form definition.
pub async fn insert(pool: &PgPool, form: &ApprovalForm) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO approval_forms (id, name, description, fields, created_by,
         target_folder_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(form.id.0)
    .bind(&form.name)
    .bind(&form.description)
    .bind(serde_json::to_value(&form.fields).unwrap_or_default())
    .bind(form.created_by.0)
    .bind(form.target_folder_id.map(|f| f.0))
    .bind(form.created_at)
    .bind(form.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Replace a form definition in place.
pub async fn update(pool: &PgPool, form: &ApprovalForm) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE approval_forms SET name = $1, description = $2, fields = $3,
         target_folder_id = $4, updated_at = $5 WHERE id = $6",
    )
    .bind(&form.name)
    .bind(&form.description)
    .bind(serde_json::to_value(&form.fields).unwrap_or_default())
    .bind(form.target_folder_id.map(|f| f.0))
    .bind(form.updated_at)
    .bind(form.id.0)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a form definition by ID.
pub async fn delete(pool: &PgPool, id: FormId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM approval_forms WHERE id = $1")
        .bind(id.0)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all form definitions into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ApprovalForm>, sqlx::Error> {
    let rows = sqlx::query_as::<_, FormRow>(
        "SELECT id, name, description, fields, created_by, target_folder_id,
         created_at, updated_at
         FROM approval_forms ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match row.into_record() {
            Some(record) => records.push(record),
            None => {
                tracing::error!("skipping approval form row with invalid field schema");
            }
        }
    }
    Ok(records)
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct FormRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    fields: serde_json::Value,
    created_by: Uuid,
    target_folder_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FormRow {
    fn into_record(self) -> Option<ApprovalForm> {
        let fields = match serde_json::from_value(self.fields) {
            Ok(fields) => fields,
            Err(err) => {
                tracing::warn!(
                    id = %self.id,
                    error = %err,
                    "skipping approval form row with undecodable fields column"
                );
                return None;
            }
        };
        Some(ApprovalForm {
            id: FormId::from_uuid(self.id),
            name: self.name,
            description: self.description,
            fields,
            created_by: UserId::from_uuid(self.created_by),
            target_folder_id: self.target_folder_id.map(FolderId::from_uuid),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
