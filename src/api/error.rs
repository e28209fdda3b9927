//! API error taxonomy shared by all handlers.
//!
//! Security-sensitive paths must keep client-facing messages generic: the
//! body never says which part of a credential or code comparison failed, and
//! server-side detail stays in the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input; `details` enumerates each violated rule.
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    /// No valid session, or credentials that failed verification. The message
    /// never distinguishes unknown account from wrong password.
    #[error("{0}")]
    Authentication(&'static str),

    /// Valid session but missing grant or wrong code.
    #[error("{0}")]
    Authorization(String),

    /// Ceiling reached; message stays generic and reveals no counters.
    #[error("Too many attempts. Please try again later.")]
    RateLimited,

    /// Required secret missing or still a placeholder. The detail is logged
    /// server-side; the client sees a generic message.
    #[error("Service is not configured")]
    Configuration(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unexpected failure; detail retained in server logs only.
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn validation_with(message: impl Into<String>, details: Vec<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Configuration(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Server-side detail for 500s; the response body stays generic.
        match &self {
            Self::Configuration(detail) => error!("Configuration error: {detail}"),
            Self::Internal(err) => error!("Internal error: {err:#}"),
            _ => {}
        }

        let details = match &self {
            Self::Validation { details, .. } => details.clone(),
            _ => Vec::new(),
        };
        let body = ErrorBody {
            error: self.to_string(),
            details,
        };
        (self.status(), Json(body)).into_response()
    }
}
