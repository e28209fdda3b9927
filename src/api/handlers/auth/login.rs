//! Login, logout, and session introspection.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

use crate::api::error::ApiError;
use crate::audit::{self, AuditAction, AuditEvent};

use super::password::{hash_password, is_legacy_hash, verify_password};
use super::session::{
    authenticate_session, clear_session_cookie, extract_session_token, session_cookie,
};
use super::state::AuthState;
use super::storage::{
    delete_session, insert_session, lookup_user_by_email, upgrade_legacy_password,
};
use super::types::{LoginRequest, SessionResponse};
use super::utils::{hash_session_token, normalize_email};

/// Exchange credentials for a session cookie.
///
/// Unknown email and wrong password return the same generic 401 so the
/// endpoint cannot be used to enumerate accounts.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session created", body = SessionResponse),
        (status = 400, description = "Missing fields", body = String),
        (status = 401, description = "Invalid credentials", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::validation("Missing payload"));
    };
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let email = normalize_email(&request.email);
    let Some(user) = lookup_user_by_email(&pool, &email).await? else {
        return Err(ApiError::Authentication("Invalid credentials"));
    };

    if !verify_password(&request.password, &user.password) {
        audit::record(
            &pool,
            AuditEvent::new(Some(user.id), AuditAction::Security, "Failed login attempt"),
        )
        .await;
        return Err(ApiError::Authentication("Invalid credentials"));
    }

    // Legacy digests are upgraded in place on the first successful login; the
    // rehash and its audit row commit together.
    if is_legacy_hash(&user.password) {
        warn!("Upgrading legacy password hash for user {}", user.id);
        let upgraded = hash_password(&request.password)?;
        upgrade_legacy_password(&pool, user.id, &upgraded).await?;
    }

    let token = insert_session(&pool, user.id, auth_state.config().session_ttl_seconds()).await?;
    let cookie = session_cookie(auth_state.config(), &token)
        .context("invalid session cookie value")
        .map_err(ApiError::Internal)?;

    audit::record(
        &pool,
        AuditEvent::new(Some(user.id), AuditAction::Login, "User logged in"),
    )
    .await;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((
        StatusCode::OK,
        headers,
        Json(SessionResponse {
            user_id: user.id.to_string(),
            email: user.email,
            name: user.name,
            access_verified: false,
        }),
    ))
}

/// Destroy the current session. Idempotent; a missing or stale cookie still
/// gets a cleared cookie back.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses((status = 204, description = "Session destroyed")),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_session_token(&token);
        if let Ok(Some(record)) = authenticate_session(&headers, &pool).await {
            audit::record(
                &pool,
                AuditEvent::new(Some(record.user_id), AuditAction::Logout, "User logged out"),
            )
            .await;
        }
        delete_session(&pool, &token_hash).await?;
    }

    let cookie = clear_session_cookie(auth_state.config())
        .context("invalid clear cookie value")
        .map_err(ApiError::Internal)?;
    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// Introspect the current session. Returns 204 instead of an error when no
/// valid session is attached so the frontend can poll it cheaply.
#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Active session", body = SessionResponse),
        (status = 204, description = "No valid session")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    pool: Extension<PgPool>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(record) = authenticate_session(&headers, &pool)
        .await
        .map_err(|_| ApiError::Internal(anyhow::anyhow!("session lookup failed")))?
    else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    Ok(Json(SessionResponse {
        user_id: record.user_id.to_string(),
        email: record.email,
        name: record.name,
        access_verified: record.access_verified,
    })
    .into_response())
}
