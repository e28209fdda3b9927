//! Inventory lot CRUD.
//!
//! All routes sit behind the request guard, so handlers can rely on the
//! authenticated [`Principal`] stashed in request extensions. Every mutation
//! commits its audit row in the same transaction.

mod storage;
pub(crate) mod types;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::api::error::ApiError;

use super::auth::{AuthState, Principal};
use storage::{LotFields, LotRecord};
use types::{LotPayload, LotResponse, LOT_CATEGORIES, LOT_STATUSES};

const CREATE_WINDOW: Duration = Duration::from_secs(5 * 60);
const CREATE_MAX_ATTEMPTS: u32 = 30;

const MAX_QUANTITY: f64 = 1_000_000.0;
const MAX_PRICE: f64 = 1_000_000.0;
const DEFAULT_STATUS: &str = "In Stock";

#[utoipa::path(
    get,
    path = "/v1/lots",
    responses((status = 200, description = "All lots, newest first", body = [LotResponse])),
    tag = "lots"
)]
pub async fn list(pool: Extension<PgPool>) -> Result<impl IntoResponse, ApiError> {
    let lots = storage::list_lots(&pool).await?;
    Ok(Json(
        lots.into_iter().map(to_response).collect::<Vec<_>>(),
    ))
}

/// Create a lot. Rate-limited per user to keep bulk imports off this path.
#[utoipa::path(
    post,
    path = "/v1/lots",
    request_body = LotPayload,
    responses(
        (status = 201, description = "Lot created", body = LotResponse),
        (status = 400, description = "Validation failure", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "lots"
)]
pub async fn create(
    principal: Extension<Principal>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LotPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    if !auth_state.rate_limiter().allow(
        &format!("create-lot:{}", principal.user_id),
        CREATE_WINDOW,
        CREATE_MAX_ATTEMPTS,
    ) {
        return Err(ApiError::RateLimited);
    }

    let Some(Json(payload)) = payload else {
        return Err(ApiError::validation("Missing payload"));
    };
    let fields = validate_payload(payload)?;

    let record = storage::insert_lot(&pool, principal.user_id, &fields).await?;
    Ok((StatusCode::CREATED, Json(to_response(record))))
}

#[utoipa::path(
    put,
    path = "/v1/lots/{id}",
    request_body = LotPayload,
    params(("id" = String, Path, description = "Lot id")),
    responses(
        (status = 200, description = "Lot updated", body = LotResponse),
        (status = 400, description = "Validation failure", body = String),
        (status = 404, description = "Unknown lot", body = String)
    ),
    tag = "lots"
)]
pub async fn update(
    principal: Extension<Principal>,
    pool: Extension<PgPool>,
    Path(id): Path<String>,
    payload: Option<Json<LotPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let lot_id = parse_lot_id(&id)?;
    let Some(Json(payload)) = payload else {
        return Err(ApiError::validation("Missing payload"));
    };
    let fields = validate_payload(payload)?;

    match storage::update_lot(&pool, principal.user_id, lot_id, &fields).await? {
        Some(record) => Ok(Json(to_response(record))),
        None => Err(ApiError::NotFound("Lot")),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/lots/{id}",
    params(("id" = String, Path, description = "Lot id")),
    responses(
        (status = 204, description = "Lot deleted"),
        (status = 404, description = "Unknown lot", body = String)
    ),
    tag = "lots"
)]
pub async fn delete(
    principal: Extension<Principal>,
    pool: Extension<PgPool>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let lot_id = parse_lot_id(&id)?;
    if storage::delete_lot(&pool, principal.user_id, lot_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Lot"))
    }
}

fn parse_lot_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::NotFound("Lot"))
}

/// Sanitize strings, bound numerics, and pin enums before anything touches
/// the database.
fn validate_payload(payload: LotPayload) -> Result<LotFields, ApiError> {
    let mut errors = Vec::new();

    let name = super::auth::sanitize_string(&payload.name);
    if name.is_empty() {
        errors.push("Name is required".to_string());
    }

    let category = super::auth::sanitize_string(&payload.category);
    if !LOT_CATEGORIES.contains(&category.as_str()) {
        errors.push(format!(
            "Category must be one of: {}",
            LOT_CATEGORIES.join(", ")
        ));
    }

    let status = payload
        .status
        .as_deref()
        .map(super::auth::sanitize_string)
        .filter(|status| !status.is_empty())
        .unwrap_or_else(|| DEFAULT_STATUS.to_string());
    if !LOT_STATUSES.contains(&status.as_str()) {
        errors.push(format!("Status must be one of: {}", LOT_STATUSES.join(", ")));
    }

    if !bounded(payload.quantity, MAX_QUANTITY) {
        errors.push("Quantity must be between 0 and 1000000".to_string());
    }
    if !bounded(payload.cost_price, MAX_PRICE) {
        errors.push("Cost price must be between 0 and 1000000".to_string());
    }
    if !bounded(payload.sale_price, MAX_PRICE) {
        errors.push("Sale price must be between 0 and 1000000".to_string());
    }

    if !errors.is_empty() {
        return Err(ApiError::validation_with("Invalid lot", errors));
    }

    Ok(LotFields {
        name,
        quantity: payload.quantity,
        cost_price: payload.cost_price,
        sale_price: payload.sale_price,
        supplier: optional_string(payload.supplier),
        category,
        variety: optional_string(payload.variety),
        process: optional_string(payload.process),
        roast_date: payload.roast_date,
        expiry_date: payload.expiry_date,
        status,
    })
}

fn bounded(value: f64, max: f64) -> bool {
    value.is_finite() && (0.0..=max).contains(&value)
}

fn optional_string(value: Option<String>) -> Option<String> {
    value
        .map(|value| super::auth::sanitize_string(&value))
        .filter(|value| !value.is_empty())
}

fn to_response(record: LotRecord) -> LotResponse {
    LotResponse {
        id: record.id.to_string(),
        name: record.name,
        quantity: record.quantity,
        cost_price: record.cost_price,
        sale_price: record.sale_price,
        supplier: record.supplier,
        category: record.category,
        variety: record.variety,
        process: record.process,
        roast_date: record.roast_date,
        expiry_date: record.expiry_date,
        status: record.status,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> LotPayload {
        LotPayload {
            name: "Huila".to_string(),
            quantity: 60.0,
            cost_price: 8.5,
            sale_price: 14.0,
            supplier: Some("  Finca <El> Paraiso  ".to_string()),
            category: "Single Origin".to_string(),
            variety: None,
            process: Some(String::new()),
            roast_date: None,
            expiry_date: None,
            status: None,
        }
    }

    #[test]
    fn valid_payload_defaults_status() {
        let fields = validate_payload(payload()).expect("valid");
        assert_eq!(fields.status, "In Stock");
        assert_eq!(fields.supplier.as_deref(), Some("Finca El Paraiso"));
        assert!(fields.process.is_none());
    }

    #[test]
    fn negative_and_non_finite_numbers_rejected() {
        let mut bad = payload();
        bad.quantity = -1.0;
        bad.cost_price = f64::NAN;
        let err = validate_payload(bad).expect_err("invalid");
        match err {
            ApiError::Validation { details, .. } => {
                assert_eq!(details.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_status_and_category_rejected() {
        let mut bad = payload();
        bad.category = "Espresso".to_string();
        bad.status = Some("Lost".to_string());
        let err = validate_payload(bad).expect_err("invalid");
        match err {
            ApiError::Validation { details, .. } => {
                assert!(details.iter().any(|d| d.starts_with("Category")));
                assert!(details.iter().any(|d| d.starts_with("Status")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_uuid_maps_to_not_found() {
        assert!(matches!(
            parse_lot_id("not-a-uuid"),
            Err(ApiError::NotFound("Lot"))
        ));
    }
}
