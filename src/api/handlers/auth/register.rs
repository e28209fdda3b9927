//! Registration endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::api::error::ApiError;

use super::password::{hash_password, validate_strength};
use super::state::AuthState;
use super::storage::{insert_user, RegisterOutcome};
use super::types::{RegisterRequest, RegisterResponse};
use super::utils::{extract_client_ip, normalize_email, sanitize_string, valid_email};

const REGISTER_WINDOW: Duration = Duration::from_secs(15 * 60);
const REGISTER_MAX_ATTEMPTS: u32 = 5;

/// Create a new account. Rate-limited per client IP.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = RegisterResponse),
        (status = 400, description = "Validation failure or duplicate email", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    if !auth_state.rate_limiter().allow(
        &format!("register:{ip}"),
        REGISTER_WINDOW,
        REGISTER_MAX_ATTEMPTS,
    ) {
        return Err(ApiError::RateLimited);
    }

    let Some(Json(request)) = payload else {
        return Err(ApiError::validation("Missing payload"));
    };

    if request.email.trim().is_empty()
        || request.password.is_empty()
        || request.name.trim().is_empty()
    {
        return Err(ApiError::validation("All fields are required"));
    }

    let email = normalize_email(&request.email);
    let name = sanitize_string(&request.name);

    if !valid_email(&email) {
        return Err(ApiError::validation("Invalid email"));
    }

    let strength = validate_strength(&request.password);
    if !strength.valid {
        return Err(ApiError::validation_with("Weak password", strength.errors));
    }

    let password_hash = hash_password(&request.password)?;

    match insert_user(&pool, &email, &name, &password_hash).await? {
        RegisterOutcome::Created(user_id) => {
            info!("Registered new user {user_id}");
            Ok((
                StatusCode::CREATED,
                Json(RegisterResponse {
                    message: "User created".to_string(),
                    user_id: user_id.to_string(),
                }),
            ))
        }
        RegisterOutcome::Conflict => Err(ApiError::validation("Email already registered")),
    }
}
