//! Read-only audit history for the dashboard's history screen.

use anyhow::Context;
use axum::{extract::Extension, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use utoipa::ToSchema;

use crate::api::error::ApiError;

const HISTORY_LIMIT: i64 = 100;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: i64,
    pub action: String,
    pub details: String,
    pub user_name: Option<String>,
    pub lot_name: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Most recent audit rows, newest first, joined with actor and lot names.
#[utoipa::path(
    get,
    path = "/v1/logs",
    responses((status = 200, description = "Last 100 audit entries", body = [LogEntry])),
    tag = "logs"
)]
pub async fn list(pool: Extension<PgPool>) -> Result<impl IntoResponse, ApiError> {
    let query = r"
        SELECT logs.id, logs.action, logs.details, logs.payload, logs.created_at,
               users.name AS user_name, lots.name AS lot_name
        FROM logs
        LEFT JOIN users ON users.id = logs.user_id
        LEFT JOIN lots ON lots.id = logs.lot_id
        ORDER BY logs.created_at DESC
        LIMIT $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(HISTORY_LIMIT)
        .fetch_all(&pool.0)
        .instrument(span)
        .await
        .context("failed to list audit logs")?;

    let entries = rows
        .into_iter()
        .map(|row| LogEntry {
            id: row.get("id"),
            action: row.get("action"),
            details: row.get("details"),
            user_name: row.get("user_name"),
            lot_name: row.get("lot_name"),
            payload: row.get("payload"),
            created_at: row.get("created_at"),
        })
        .collect::<Vec<_>>();

    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_entry_serializes_camel_case() {
        let entry = LogEntry {
            id: 1,
            action: "update_lot".to_string(),
            details: "Updated lot \"Huila\"".to_string(),
            user_name: Some("Alice".to_string()),
            lot_name: Some("Huila".to_string()),
            payload: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&entry).expect("serialize");
        assert!(value.get("userName").is_some());
        assert!(value.get("lotName").is_some());
        assert!(value.get("createdAt").is_some());
    }
}
