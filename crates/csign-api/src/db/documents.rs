//! Document persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `documents`
//! table. Documents are append-only: they are filed by the engine on
//! final approval and never updated afterwards.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use csign_core::{DocumentId, FolderId, UserId};

use crate::state::DocumentRecord;

/// Insert a newly filed document.
pub async fn insert(pool: &PgPool, document: &DocumentRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO documents (id, name, folder_id, metadata, created_by, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(document.id.0)
    .bind(&document.name)
    .bind(document.folder_id.0)
    .bind(&document.metadata)
    .bind(document.created_by.0)
    .bind(document.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all documents into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<DocumentRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, name, folder_id, metadata, created_by, created_at
         FROM documents ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(DocumentRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    name: String,
    folder_id: Uuid,
    metadata: serde_json::Value,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl DocumentRow {
    fn into_record(self) -> DocumentRecord {
        DocumentRecord {
            id: DocumentId::from_uuid(self.id),
            name: self.name,
            folder_id: FolderId::from_uuid(self.folder_id),
            metadata: self.metadata,
            created_by: UserId::from_uuid(self.created_by),
            created_at: self.created_at,
        }
    }
}
