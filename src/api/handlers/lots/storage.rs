//! Database access for lots, with audit rows committed in the same
//! transaction as the mutation they describe.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::audit::{self, AuditAction, AuditEvent};

/// One lot row as stored.
#[derive(Debug, Clone)]
pub(crate) struct LotRecord {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) quantity: f64,
    pub(crate) cost_price: f64,
    pub(crate) sale_price: f64,
    pub(crate) supplier: Option<String>,
    pub(crate) category: String,
    pub(crate) variety: Option<String>,
    pub(crate) process: Option<String>,
    pub(crate) roast_date: Option<DateTime<Utc>>,
    pub(crate) expiry_date: Option<DateTime<Utc>>,
    pub(crate) status: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

/// Validated field values ready for insertion or update.
#[derive(Debug)]
pub(super) struct LotFields {
    pub(super) name: String,
    pub(super) quantity: f64,
    pub(super) cost_price: f64,
    pub(super) sale_price: f64,
    pub(super) supplier: Option<String>,
    pub(super) category: String,
    pub(super) variety: Option<String>,
    pub(super) process: Option<String>,
    pub(super) roast_date: Option<DateTime<Utc>>,
    pub(super) expiry_date: Option<DateTime<Utc>>,
    pub(super) status: String,
}

const SELECT_COLUMNS: &str = r"
    SELECT id, name, quantity, cost_price, sale_price, supplier, category,
           variety, process, roast_date, expiry_date, status, created_at, updated_at
    FROM lots
";

fn row_to_record(row: &sqlx::postgres::PgRow) -> LotRecord {
    LotRecord {
        id: row.get("id"),
        name: row.get("name"),
        quantity: row.get("quantity"),
        cost_price: row.get("cost_price"),
        sale_price: row.get("sale_price"),
        supplier: row.get("supplier"),
        category: row.get("category"),
        variety: row.get("variety"),
        process: row.get("process"),
        roast_date: row.get("roast_date"),
        expiry_date: row.get("expiry_date"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(super) async fn list_lots(pool: &PgPool) -> Result<Vec<LotRecord>> {
    let query = format!("{SELECT_COLUMNS} ORDER BY created_at DESC");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list lots")?;
    Ok(rows.iter().map(row_to_record).collect())
}

/// Insert a lot and its `create_lot` audit row in one transaction.
pub(super) async fn insert_lot(
    pool: &PgPool,
    actor: Uuid,
    fields: &LotFields,
) -> Result<LotRecord> {
    let mut tx = pool.begin().await.context("begin create-lot transaction")?;

    let query = r"
        INSERT INTO lots (name, quantity, cost_price, sale_price, supplier,
                          category, variety, process, roast_date, expiry_date, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id, name, quantity, cost_price, sale_price, supplier, category,
                  variety, process, roast_date, expiry_date, status, created_at, updated_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&fields.name)
        .bind(fields.quantity)
        .bind(fields.cost_price)
        .bind(fields.sale_price)
        .bind(&fields.supplier)
        .bind(&fields.category)
        .bind(&fields.variety)
        .bind(&fields.process)
        .bind(fields.roast_date)
        .bind(fields.expiry_date)
        .bind(&fields.status)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert lot")?;
    let record = row_to_record(&row);

    audit::record_tx(
        &mut tx,
        AuditEvent::new(
            Some(actor),
            AuditAction::CreateLot,
            format!("Created lot \"{}\"", record.name),
        )
        .with_lot(record.id),
    )
    .await?;

    tx.commit().await.context("commit create-lot transaction")?;
    Ok(record)
}

/// Update a lot and record which fields changed, atomically.
///
/// Returns `None` when the lot does not exist. The audit payload maps each
/// changed field to its old and new value.
pub(super) async fn update_lot(
    pool: &PgPool,
    actor: Uuid,
    lot_id: Uuid,
    fields: &LotFields,
) -> Result<Option<LotRecord>> {
    let mut tx = pool.begin().await.context("begin update-lot transaction")?;

    let query = format!("{SELECT_COLUMNS} WHERE id = $1 FOR UPDATE");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let Some(row) = sqlx::query(&query)
        .bind(lot_id)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lock lot for update")?
    else {
        let _ = tx.rollback().await;
        return Ok(None);
    };
    let before = row_to_record(&row);

    let query = r"
        UPDATE lots
        SET name = $2, quantity = $3, cost_price = $4, sale_price = $5,
            supplier = $6, category = $7, variety = $8, process = $9,
            roast_date = $10, expiry_date = $11, status = $12, updated_at = NOW()
        WHERE id = $1
        RETURNING id, name, quantity, cost_price, sale_price, supplier, category,
                  variety, process, roast_date, expiry_date, status, created_at, updated_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(lot_id)
        .bind(&fields.name)
        .bind(fields.quantity)
        .bind(fields.cost_price)
        .bind(fields.sale_price)
        .bind(&fields.supplier)
        .bind(&fields.category)
        .bind(&fields.variety)
        .bind(&fields.process)
        .bind(fields.roast_date)
        .bind(fields.expiry_date)
        .bind(&fields.status)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update lot")?;
    let after = row_to_record(&row);

    let changes = diff_lots(&before, &after);
    let mut event = AuditEvent::new(
        Some(actor),
        AuditAction::UpdateLot,
        format!("Updated lot \"{}\"", after.name),
    )
    .with_lot(after.id);
    if !changes.is_empty() {
        event = event.with_payload(Value::Object(changes));
    }
    audit::record_tx(&mut tx, event).await?;

    tx.commit().await.context("commit update-lot transaction")?;
    Ok(Some(after))
}

/// Delete a lot and its `delete_lot` audit row atomically.
///
/// Returns `false` when the lot does not exist.
pub(super) async fn delete_lot(pool: &PgPool, actor: Uuid, lot_id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await.context("begin delete-lot transaction")?;

    let query = "SELECT name FROM lots WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let Some(row) = sqlx::query(query)
        .bind(lot_id)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to fetch lot for delete")?
    else {
        let _ = tx.rollback().await;
        return Ok(false);
    };
    let name: String = row.get("name");

    // The audit row must land before the delete so the lot_id FK still
    // resolves; ON DELETE SET NULL then detaches it.
    audit::record_tx(
        &mut tx,
        AuditEvent::new(
            Some(actor),
            AuditAction::DeleteLot,
            format!("Deleted lot \"{name}\""),
        )
        .with_lot(lot_id),
    )
    .await?;

    let query = "DELETE FROM lots WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(lot_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to delete lot")?;

    tx.commit().await.context("commit delete-lot transaction")?;
    Ok(true)
}

/// Map each changed field to `{"old": ..., "new": ...}`.
fn diff_lots(before: &LotRecord, after: &LotRecord) -> Map<String, Value> {
    let mut changes = Map::new();
    let mut push = |field: &str, old: Value, new: Value| {
        if old != new {
            changes.insert(field.to_string(), json!({"old": old, "new": new}));
        }
    };

    push("name", json!(before.name), json!(after.name));
    push("quantity", json!(before.quantity), json!(after.quantity));
    push(
        "cost_price",
        json!(before.cost_price),
        json!(after.cost_price),
    );
    push(
        "sale_price",
        json!(before.sale_price),
        json!(after.sale_price),
    );
    push("supplier", json!(before.supplier), json!(after.supplier));
    push("category", json!(before.category), json!(after.category));
    push("variety", json!(before.variety), json!(after.variety));
    push("process", json!(before.process), json!(after.process));
    push(
        "roast_date",
        json!(before.roast_date),
        json!(after.roast_date),
    );
    push(
        "expiry_date",
        json!(before.expiry_date),
        json!(after.expiry_date),
    );
    push("status", json!(before.status), json!(after.status));

    changes
}
