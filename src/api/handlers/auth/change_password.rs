//! Authenticated password change.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::api::error::ApiError;

use super::password::{hash_password, validate_strength, verify_password};
use super::session::authenticate_session;
use super::state::AuthState;
use super::storage::{change_password as persist_change, lookup_user_by_email};
use super::types::{ChangePasswordRequest, ChangePasswordResponse};

const CHANGE_WINDOW: Duration = Duration::from_secs(15 * 60);
const CHANGE_MAX_ATTEMPTS: u32 = 5;

/// Rotate the caller's password after re-verifying the current one.
/// Rate-limited per account so a hijacked session cannot brute the current
/// password through this endpoint.
#[utoipa::path(
    post,
    path = "/v1/user/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ChangePasswordResponse),
        (status = 400, description = "Validation failure or wrong current password", body = String),
        (status = 401, description = "No session", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn change_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let record = authenticate_session(&headers, &pool)
        .await
        .map_err(|_| ApiError::Internal(anyhow::anyhow!("session lookup failed")))?
        .ok_or(ApiError::Authentication("Not authenticated"))?;

    if !auth_state.rate_limiter().allow(
        &format!("change-password:{}", record.email),
        CHANGE_WINDOW,
        CHANGE_MAX_ATTEMPTS,
    ) {
        return Err(ApiError::RateLimited);
    }

    let Some(Json(request)) = payload else {
        return Err(ApiError::validation("Missing payload"));
    };
    if request.current_password.is_empty() || request.new_password.is_empty() {
        return Err(ApiError::validation(
            "Current and new passwords are required",
        ));
    }

    let user = lookup_user_by_email(&pool, &record.email)
        .await?
        .ok_or(ApiError::Authentication("Not authenticated"))?;

    if !verify_password(&request.current_password, &user.password) {
        return Err(ApiError::validation("Current password is incorrect"));
    }

    let strength = validate_strength(&request.new_password);
    if !strength.valid {
        return Err(ApiError::validation_with(
            "Weak password",
            strength.errors,
        ));
    }

    if request.new_password == request.current_password {
        return Err(ApiError::validation(
            "New password must differ from the current one",
        ));
    }

    let password_hash = hash_password(&request.new_password)?;
    persist_change(&pool, user.id, &password_hash).await?;

    Ok(Json(ChangePasswordResponse {
        success: true,
        message: "Password changed".to_string(),
    }))
}
