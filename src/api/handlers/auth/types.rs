//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub access_verified: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAccessRequest {
    pub access_code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyAccessResponse {
    pub success: bool,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ChangePasswordResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn verify_access_request_uses_camel_case() -> Result<()> {
        let request: VerifyAccessRequest =
            serde_json::from_str(r#"{"accessCode":"1234"}"#).context("decode")?;
        assert_eq!(request.access_code, "1234");
        Ok(())
    }

    #[test]
    fn change_password_request_uses_camel_case() -> Result<()> {
        let request: ChangePasswordRequest =
            serde_json::from_str(r#"{"currentPassword":"old","newPassword":"new"}"#)
                .context("decode")?;
        assert_eq!(request.current_password, "old");
        assert_eq!(request.new_password, "new");
        Ok(())
    }

    #[test]
    fn session_response_round_trips() -> Result<()> {
        let response = SessionResponse {
            user_id: "id".to_string(),
            email: "a@b.com".to_string(),
            name: "Alice".to_string(),
            access_verified: false,
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(
            value.get("accessVerified"),
            Some(&serde_json::Value::Bool(false))
        );
        let decoded: SessionResponse = serde_json::from_value(value)?;
        assert_eq!(decoded.email, "a@b.com");
        Ok(())
    }
}
