//! Step-up verification: exchange the master access code for a grant cookie.

use anyhow::Context;
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::api::error::ApiError;
use crate::audit::{self, AuditAction, AuditEvent};

use super::password::constant_time_eq;
use super::session::{access_grant_cookie, authenticate_session, extract_session_token};
use super::state::AuthState;
use super::storage::mark_session_access_verified;
use super::types::{VerifyAccessRequest, VerifyAccessResponse};
use super::utils::{extract_client_ip, hash_session_token};

const VERIFY_WINDOW: Duration = Duration::from_secs(60 * 60);
const VERIFY_MAX_ATTEMPTS: u32 = 3;

/// Check the submitted access code against the operator-configured master
/// code and, on success, set the grant cookie and flag the session.
///
/// Attempts are counted per client IP before the code is inspected, so
/// guessing is throttled even across accounts.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-access",
    request_body = VerifyAccessRequest,
    responses(
        (status = 200, description = "Access granted", body = VerifyAccessResponse),
        (status = 400, description = "Missing code", body = String),
        (status = 401, description = "No valid session", body = String),
        (status = 403, description = "Incorrect code", body = String),
        (status = 429, description = "Rate limited", body = String),
        (status = 500, description = "Access code not configured", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_access(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyAccessRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let record = authenticate_session(&headers, &pool)
        .await
        .map_err(|_| ApiError::Internal(anyhow::anyhow!("session lookup failed")))?
        .ok_or(ApiError::Authentication("Not authenticated"))?;

    let ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    if !auth_state.rate_limiter().allow(
        &format!("verify-access:{ip}"),
        VERIFY_WINDOW,
        VERIFY_MAX_ATTEMPTS,
    ) {
        audit::record(
            &pool,
            AuditEvent::new(
                Some(record.user_id),
                AuditAction::SecurityAlert,
                format!("Access code attempts rate limited for IP {ip}"),
            ),
        )
        .await;
        return Err(ApiError::RateLimited);
    }

    let submitted = submitted_code(payload);
    if submitted.is_empty() {
        return Err(ApiError::validation("Access code is required"));
    }

    let Some(master) = auth_state.config().master_access_code() else {
        return Err(ApiError::Configuration(
            "master access code missing or placeholder".to_string(),
        ));
    };

    if !constant_time_eq(submitted.as_bytes(), master.as_bytes()) {
        audit::record(
            &pool,
            AuditEvent::new(
                Some(record.user_id),
                AuditAction::AccessDenied,
                format!("Incorrect access code from IP {ip}"),
            ),
        )
        .await;
        return Err(ApiError::Authorization("Incorrect access code".to_string()));
    }

    // Session token must exist here; authenticate_session resolved it above.
    if let Some(token) = extract_session_token(&headers) {
        mark_session_access_verified(&pool, &hash_session_token(&token)).await?;
    }

    audit::record(
        &pool,
        AuditEvent::new(
            Some(record.user_id),
            AuditAction::AccessGranted,
            format!("Access code verified from IP {ip}"),
        ),
    )
    .await;

    let cookie = access_grant_cookie(auth_state.config())
        .context("invalid access grant cookie value")
        .map_err(ApiError::Internal)?;
    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    Ok((
        StatusCode::OK,
        response_headers,
        Json(VerifyAccessResponse {
            success: true,
            message: "Access granted".to_string(),
        }),
    ))
}

/// Codes pasted from a password manager often carry stray whitespace; strip
/// it before the empty check and the comparison.
fn submitted_code(payload: Option<Json<VerifyAccessRequest>>) -> String {
    payload
        .map(|Json(request)| request.access_code.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submitted_code_is_trimmed() {
        let payload = Some(Json(VerifyAccessRequest {
            access_code: "  1234  ".to_string(),
        }));
        assert_eq!(submitted_code(payload), "1234");
    }

    #[test]
    fn missing_or_blank_payload_yields_empty_code() {
        assert_eq!(submitted_code(None), "");

        let payload = Some(Json(VerifyAccessRequest {
            access_code: "   ".to_string(),
        }));
        assert_eq!(submitted_code(payload), "");
    }
}
