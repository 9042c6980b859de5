//! Approval route persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `approval_routes`
//! table. The step sequence is stored as JSONB.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use csign_core::{RouteId, UserId};
use csign_engine::ApprovalRoute;

/// Insert a new route definition.
pub async fn insert(pool: &PgPool, route: &ApprovalRoute) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO approval_routes (id, name, description, steps, created_by,
         created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(route.id.0)
    .bind(&route.name)
    .bind(&route.description)
    .bind(serde_json::to_value(&route.steps).unwrap_or_default())
    .bind(route.created_by.0)
    .bind(route.created_at)
    .bind(route.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Replace a route definition in place.
pub async fn update(pool: &PgPool, route: &ApprovalRoute) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE approval_routes SET name = $1, description = $2, steps = $3,
         updated_at = $4 WHERE id = $5",
    )
    .bind(&route.name)
    .bind(&route.description)
    .bind(serde_json::to_value(&route.steps).unwrap_or_default())
    .bind(route.updated_at)
    .bind(route.id.0)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a route definition by ID.
pub async fn delete(pool: &PgPool, id: RouteId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM approval_routes WHERE id = $1")
        .bind(id.0)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all route definitions into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ApprovalRoute>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RouteRow>(
        "SELECT id, name, description, steps, created_by, created_at, updated_at
         FROM approval_routes ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match row.into_record() {
            Some(record) => records.push(record),
            None => {
                tracing::error!("skipping approval route row with invalid step sequence");
            }
        }
    }
    Ok(records)
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    steps: serde_json::Value,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RouteRow {
    fn into_record(self) -> Option<ApprovalRoute> {
        let steps = match serde_json::from_value(self.steps) {
            Ok(steps) => steps,
            Err(err) => {
                tracing::warn!(
                    id = %self.id,
                    error = %err,
                    "skipping approval route row with undecodable steps column"
                );
                return None;
            }
        };
        Some(ApprovalRoute {
            id: RouteId::from_uuid(self.id),
            name: self.name,
            description: self.description,
            steps,
            created_by: UserId::from_uuid(self.created_by),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
