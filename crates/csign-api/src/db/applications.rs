//! Application persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `applications`
//! table. Form data, the snapshotted route steps, and the decision
//! history are stored as JSONB; the whole row is rewritten on every
//! transition since transitions touch several columns at once.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use csign_core::{ApplicationId, DocumentId, FormId, RouteId, UserId};
use csign_engine::{Application, ApprovalStatus};

/// Insert a new application.
pub async fn insert(pool: &PgPool, app: &Application) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO applications (id, form_id, form_name, route_id, route_name,
         applicant_id, status, current_step, form_data, route_steps, history,
         document_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(app.id.0)
    .bind(app.form_id.0)
    .bind(&app.form_name)
    .bind(app.route_id.0)
    .bind(&app.route_name)
    .bind(app.applicant_id.0)
    .bind(app.status.as_str())
    .bind(app.current_step as i32)
    .bind(&app.form_data)
    .bind(serde_json::to_value(&app.route_steps).unwrap_or_default())
    .bind(serde_json::to_value(&app.history).unwrap_or_default())
    .bind(app.document_id.map(|d| d.0))
    .bind(app.created_at)
    .bind(app.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Rewrite the mutable columns of an application after a transition.
pub async fn update(pool: &PgPool, app: &Application) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE applications SET status = $1, current_step = $2, form_data = $3,
         route_steps = $4, history = $5, document_id = $6, updated_at = $7
         WHERE id = $8",
    )
    .bind(app.status.as_str())
    .bind(app.current_step as i32)
    .bind(&app.form_data)
    .bind(serde_json::to_value(&app.route_steps).unwrap_or_default())
    .bind(serde_json::to_value(&app.history).unwrap_or_default())
    .bind(app.document_id.map(|d| d.0))
    .bind(app.updated_at)
    .bind(app.id.0)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete an application by ID.
pub async fn delete(pool: &PgPool, id: ApplicationId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM applications WHERE id = $1")
        .bind(id.0)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all applications into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Application>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ApplicationRow>(
        "SELECT id, form_id, form_name, route_id, route_name, applicant_id,
         status, current_step, form_data, route_steps, history, document_id,
         created_at, updated_at
         FROM applications ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match row.into_record() {
            Some(record) => records.push(record),
            None => {
                tracing::error!("skipping application row with invalid status or columns");
            }
        }
    }
    Ok(records)
}

fn parse_status(s: &str) -> Option<ApprovalStatus> {
    match s {
        "DRAFT" => Some(ApprovalStatus::Draft),
        "PENDING" => Some(ApprovalStatus::Pending),
        "APPROVED" => Some(ApprovalStatus::Approved),
        "REJECTED" => Some(ApprovalStatus::Rejected),
        _ => None,
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct ApplicationRow {
    id: Uuid,
    form_id: Uuid,
    form_name: String,
    route_id: Uuid,
    route_name: String,
    applicant_id: Uuid,
    status: String,
    current_step: i32,
    form_data: serde_json::Value,
    route_steps: serde_json::Value,
    history: serde_json::Value,
    document_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApplicationRow {
    fn into_record(self) -> Option<Application> {
        let status = match parse_status(&self.status) {
            Some(status) => status,
            None => {
                tracing::warn!(
                    id = %self.id,
                    status = %self.status,
                    "skipping application row with unknown status"
                );
                return None;
            }
        };
        let route_steps = match serde_json::from_value(self.route_steps) {
            Ok(steps) => steps,
            Err(err) => {
                tracing::warn!(id = %self.id, error = %err, "undecodable route_steps column");
                return None;
            }
        };
        let history = match serde_json::from_value(self.history) {
            Ok(history) => history,
            Err(err) => {
                tracing::warn!(id = %self.id, error = %err, "undecodable history column");
                return None;
            }
        };
        Some(Application {
            id: ApplicationId::from_uuid(self.id),
            form_id: FormId::from_uuid(self.form_id),
            form_name: self.form_name,
            route_id: RouteId::from_uuid(self.route_id),
            route_name: self.route_name,
            applicant_id: UserId::from_uuid(self.applicant_id),
            status,
            current_step: self.current_step as u32,
            form_data: self.form_data,
            route_steps,
            history,
            document_id: self.document_id.map(DocumentId::from_uuid),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
