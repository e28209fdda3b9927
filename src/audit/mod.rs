//! Append-only audit trail.
//!
//! Every security-relevant action and every lot mutation appends one immutable
//! row to the `logs` table. Rows carry a human-readable `details` string plus
//! an optional structured `payload` (field → old/new values) so downstream
//! tooling does not have to parse prose.
//!
//! Two write paths exist on purpose:
//!
//! - [`record`] is best-effort: a failed audit write is logged server-side and
//!   swallowed, so it can never abort an already-committed primary operation.
//! - [`record_tx`] joins the caller's transaction so the primary mutation and
//!   its audit row commit or roll back together.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, Instrument};
use uuid::Uuid;

/// Action kinds stored in `logs.action`.
///
/// The wire values are consumed by existing log tooling and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Login,
    Logout,
    Register,
    CreateLot,
    UpdateLot,
    DeleteLot,
    ChangePassword,
    Security,
    SecurityAlert,
    AccessDenied,
    AccessGranted,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Register => "register",
            Self::CreateLot => "create_lot",
            Self::UpdateLot => "update_lot",
            Self::DeleteLot => "delete_lot",
            Self::ChangePassword => "change_password",
            Self::Security => "security",
            Self::SecurityAlert => "security_alert",
            Self::AccessDenied => "access_denied",
            Self::AccessGranted => "access_granted",
        }
    }
}

/// One audit row before insertion. Actor is `None` for system or
/// unauthenticated events.
#[derive(Debug)]
pub struct AuditEvent {
    pub actor: Option<Uuid>,
    pub action: AuditAction,
    pub details: String,
    pub payload: Option<serde_json::Value>,
    pub lot_id: Option<Uuid>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(actor: Option<Uuid>, action: AuditAction, details: impl Into<String>) -> Self {
        Self {
            actor,
            action,
            details: details.into(),
            payload: None,
            lot_id: None,
        }
    }

    #[must_use]
    pub fn with_lot(mut self, lot_id: Uuid) -> Self {
        self.lot_id = Some(lot_id);
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

const INSERT_LOG: &str = r"
    INSERT INTO logs (user_id, lot_id, action, details, payload, created_at)
    VALUES ($1, $2, $3, $4, $5, NOW())
";

/// Best-effort append. Failures are logged and swallowed so the audit write
/// never surfaces into the primary operation's result.
pub async fn record(pool: &PgPool, event: AuditEvent) {
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = INSERT_LOG
    );
    let result = sqlx::query(INSERT_LOG)
        .bind(event.actor)
        .bind(event.lot_id)
        .bind(event.action.as_str())
        .bind(&event.details)
        .bind(&event.payload)
        .execute(pool)
        .instrument(span)
        .await;

    if let Err(err) = result {
        error!(
            action = event.action.as_str(),
            "Failed to append audit log: {err}"
        );
    }
}

/// Transactional append: commits with the caller's primary mutation.
///
/// # Errors
/// Returns an error if the insert fails, rolling the whole transaction back.
pub async fn record_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: AuditEvent,
) -> Result<()> {
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = INSERT_LOG
    );
    sqlx::query(INSERT_LOG)
        .bind(event.actor)
        .bind(event.lot_id)
        .bind(event.action.as_str())
        .bind(&event.details)
        .bind(&event.payload)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to append audit log")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_wire_values_are_stable() {
        let expected = [
            (AuditAction::Login, "login"),
            (AuditAction::Logout, "logout"),
            (AuditAction::Register, "register"),
            (AuditAction::CreateLot, "create_lot"),
            (AuditAction::UpdateLot, "update_lot"),
            (AuditAction::DeleteLot, "delete_lot"),
            (AuditAction::ChangePassword, "change_password"),
            (AuditAction::Security, "security"),
            (AuditAction::SecurityAlert, "security_alert"),
            (AuditAction::AccessDenied, "access_denied"),
            (AuditAction::AccessGranted, "access_granted"),
        ];
        for (action, wire) in expected {
            assert_eq!(action.as_str(), wire);
        }
    }

    #[test]
    fn serde_matches_as_str() {
        for action in [
            AuditAction::Login,
            AuditAction::SecurityAlert,
            AuditAction::ChangePassword,
        ] {
            let serialized = serde_json::to_value(action).expect("serialize");
            assert_eq!(serialized, json!(action.as_str()));
        }
    }

    #[test]
    fn event_builder_sets_optional_fields() {
        let lot = Uuid::new_v4();
        let event = AuditEvent::new(None, AuditAction::UpdateLot, "Lot updated")
            .with_lot(lot)
            .with_payload(json!({"status": {"old": "Ordered", "new": "Arrived"}}));
        assert_eq!(event.lot_id, Some(lot));
        assert!(event.payload.is_some());
        assert_eq!(event.actor, None);
    }
}
