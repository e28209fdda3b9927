//! Session cookies: minting, extraction, and resolution.
//!
//! Sessions are opaque random tokens; only their SHA-256 hash touches the
//! database. The step-up grant is a separate, shorter-lived cookie (see
//! `verify_access`) whose literal value is checked by the request guard.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue, StatusCode,
};
use sqlx::PgPool;
use tracing::error;

use super::state::AuthConfig;
use super::storage::{lookup_session, SessionRecord};
use super::utils::hash_session_token;

pub(crate) const SESSION_COOKIE_NAME: &str = "beanledger_session";
/// Step-up grant cookie. The literal value `"true"` is what existing clients
/// and the guard expect; anything else is treated as absent.
pub(crate) const ACCESS_COOKIE_NAME: &str = "access_verified";
pub(crate) const ACCESS_COOKIE_VALUE: &str = "true";

/// Resolve a session cookie into a session record, if present.
///
/// Returns `Ok(None)` when the cookie is missing or invalid.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    pool: &PgPool,
) -> Result<Option<SessionRecord>, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_session_token(&token);
    match lookup_session(pool, &token_hash).await {
        Ok(record) => Ok(record),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Build the `HttpOnly` session cookie for a freshly minted token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build the step-up grant cookie set on a successful access-code check.
/// Its 24h lifetime is independent of the 7-day session and it is never
/// cleared explicitly; expiry is the only revocation.
pub(super) fn access_grant_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.access_grant_ttl_seconds();
    let mut cookie = format!(
        "{ACCESS_COOKIE_NAME}={ACCESS_COOKIE_VALUE}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Whether the request carries a valid step-up grant cookie.
pub(crate) fn has_access_grant(headers: &HeaderMap) -> bool {
    cookie_value(headers, ACCESS_COOKIE_NAME).as_deref() == Some(ACCESS_COOKIE_VALUE)
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    cookie_value(headers, SESSION_COOKIE_NAME)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
