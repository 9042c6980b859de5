//! Folder persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `folders` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use csign_core::{FolderId, UserId};

use crate::state::FolderRecord;

/// Insert a new folder.
pub async fn insert(pool: &PgPool, folder: &FolderRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO folders (id, name, parent_id, created_by, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(folder.id.0)
    .bind(&folder.name)
    .bind(folder.parent_id.map(|p| p.0))
    .bind(folder.created_by.0)
    .bind(folder.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a folder by ID.
pub async fn delete(pool: &PgPool, id: FolderId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM folders WHERE id = $1")
        .bind(id.0)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all folders into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<FolderRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, FolderRow>(
        "SELECT id, name, parent_id, created_by, created_at
         FROM folders ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(FolderRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct FolderRow {
    id: Uuid,
    name: String,
    parent_id: Option<Uuid>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl FolderRow {
    fn into_record(self) -> FolderRecord {
        FolderRecord {
            id: FolderId::from_uuid(self.id),
            name: self.name,
            parent_id: self.parent_id.map(FolderId::from_uuid),
            created_by: UserId::from_uuid(self.created_by),
            created_at: self.created_at,
        }
    }
}
