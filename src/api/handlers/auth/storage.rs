//! Database helpers for credentials and sessions.

use anyhow::{anyhow, Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::audit::{self, AuditAction, AuditEvent};

use super::utils::{generate_session_token, hash_session_token, is_unique_violation};

/// Login material for one user.
pub(crate) struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) password: String,
}

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(super) enum RegisterOutcome {
    Created(Uuid),
    Conflict,
}

/// Minimal data returned for a valid session cookie.
pub(crate) struct SessionRecord {
    pub(crate) user_id: Uuid,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) access_verified: bool,
}

pub(crate) async fn lookup_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>> {
    let query = "SELECT id, email, name, password FROM users WHERE email = $1 LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user")?;

    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        password: row.get("password"),
    }))
}

/// Insert a new user and its `register` audit row in one transaction.
pub(super) async fn insert_user(
    pool: &PgPool,
    email: &str,
    name: &str,
    password_hash: &str,
) -> Result<RegisterOutcome> {
    let mut tx = pool.begin().await.context("begin register transaction")?;

    let query = r"
        INSERT INTO users (email, name, password)
        VALUES ($1, $2, $3)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    let user_id: Uuid = match row {
        Ok(row) => row.get("id"),
        Err(err) => {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Ok(RegisterOutcome::Conflict);
            }
            return Err(err).context("failed to insert user");
        }
    };

    audit::record_tx(
        &mut tx,
        AuditEvent::new(Some(user_id), AuditAction::Register, "New user registered"),
    )
    .await?;

    tx.commit().await.context("commit register transaction")?;
    Ok(RegisterOutcome::Created(user_id))
}

fn legacy_upgrade_event(user_id: Uuid) -> AuditEvent {
    AuditEvent::new(
        Some(user_id),
        AuditAction::Security,
        "Password hash upgraded from legacy format",
    )
}

/// Rewrite a legacy password hash and its `security` audit row atomically.
pub(super) async fn upgrade_legacy_password(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("begin hash-upgrade transaction")?;

    let query = "UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to upgrade password hash")?;

    audit::record_tx(&mut tx, legacy_upgrade_event(user_id)).await?;

    tx.commit().await.context("commit hash-upgrade transaction")?;
    Ok(())
}

/// Replace the password hash and its `change_password` audit row atomically.
pub(super) async fn change_password(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("begin change-password transaction")?;

    let query = "UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update password")?;

    audit::record_tx(
        &mut tx,
        AuditEvent::new(
            Some(user_id),
            AuditAction::ChangePassword,
            "User changed their password",
        ),
    )
    .await?;

    tx.commit()
        .await
        .context("commit change-password transaction")?;
    Ok(())
}

/// Mint a session row and return the raw token for the cookie.
///
/// `access_verified` always starts false: a fresh login never inherits a
/// prior session's step-up status.
pub(super) async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    let query = r"
        INSERT INTO user_sessions (user_id, session_hash, access_verified, expires_at)
        VALUES ($1, $2, FALSE, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

pub(crate) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    // Only unexpired sessions resolve; expiry is fixed at issuance.
    let query = r"
        SELECT users.id, users.email, users.name, user_sessions.access_verified
        FROM user_sessions
        JOIN users ON users.id = user_sessions.user_id
        WHERE user_sessions.session_hash = $1
          AND user_sessions.expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    if row.is_none() {
        return Ok(None);
    }

    // Record activity for visibility without extending the session TTL.
    let query = "UPDATE user_sessions SET last_seen_at = NOW() WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update session last_seen_at")?;

    Ok(row.map(|row| SessionRecord {
        user_id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        access_verified: row.get("access_verified"),
    }))
}

/// Flip the session's step-up flag after a successful access-code check.
/// Only still-valid sessions are updated.
pub(super) async fn mark_session_access_verified(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let query = r"
        UPDATE user_sessions
        SET access_verified = TRUE
        WHERE session_hash = $1
          AND expires_at > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark session access_verified")?;
    Ok(())
}

pub(super) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    // Logout is idempotent; it's fine if no rows are deleted.
    let query = "DELETE FROM user_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{legacy_upgrade_event, RegisterOutcome, SessionRecord, UserRecord};
    use crate::audit::AuditAction;
    use uuid::Uuid;

    #[test]
    fn legacy_upgrade_audits_under_security_action() {
        let user_id = Uuid::new_v4();
        let event = legacy_upgrade_event(user_id);
        assert_eq!(event.action, AuditAction::Security);
        assert_eq!(event.actor, Some(user_id));
        assert!(event.details.contains("legacy"));
    }

    #[test]
    fn register_outcome_debug_names() {
        let id = Uuid::nil();
        assert_eq!(
            format!("{:?}", RegisterOutcome::Created(id)),
            format!("Created({id:?})")
        );
        assert_eq!(format!("{:?}", RegisterOutcome::Conflict), "Conflict");
    }

    #[test]
    fn session_record_holds_values() {
        let record = SessionRecord {
            user_id: Uuid::nil(),
            email: "a@b.com".to_string(),
            name: "Alice".to_string(),
            access_verified: false,
        };
        assert!(!record.access_verified);
        assert_eq!(record.email, "a@b.com");
    }

    #[test]
    fn user_record_holds_values() {
        let record = UserRecord {
            id: Uuid::nil(),
            email: "a@b.com".to_string(),
            name: "Alice".to_string(),
            password: "salt:key".to_string(),
        };
        assert_eq!(record.id, Uuid::nil());
        assert_eq!(record.password, "salt:key");
        assert_eq!(record.name, "Alice");
    }
}
