//! Request/response types for lot endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Allowed lifecycle states for a lot, in order.
pub(crate) const LOT_STATUSES: &[&str] = &["Ordered", "Arrived", "In Stock", "Packaged", "Sold"];

pub(crate) const LOT_CATEGORIES: &[&str] = &["Blend", "Single Origin"];

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LotPayload {
    pub name: String,
    pub quantity: f64,
    pub cost_price: f64,
    pub sale_price: f64,
    #[serde(default)]
    pub supplier: Option<String>,
    pub category: String,
    #[serde(default)]
    pub variety: Option<String>,
    #[serde(default)]
    pub process: Option<String>,
    #[serde(default)]
    pub roast_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LotResponse {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub cost_price: f64,
    pub sale_price: f64,
    pub supplier: Option<String>,
    pub category: String,
    pub variety: Option<String>,
    pub process: Option<String>,
    pub roast_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn payload_uses_camel_case() -> Result<()> {
        let payload: LotPayload = serde_json::from_str(
            r#"{"name":"Huila","quantity":60.0,"costPrice":8.5,"salePrice":14.0,"category":"Single Origin"}"#,
        )
        .context("decode")?;
        assert_eq!(payload.name, "Huila");
        assert!(payload.supplier.is_none());
        assert!(payload.status.is_none());
        Ok(())
    }

    #[test]
    fn status_list_covers_lifecycle() {
        assert_eq!(LOT_STATUSES.first(), Some(&"Ordered"));
        assert_eq!(LOT_STATUSES.last(), Some(&"Sold"));
        assert!(LOT_STATUSES.contains(&"In Stock"));
    }
}
