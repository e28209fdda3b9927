//! Request guard for the dashboard surface.
//!
//! Layered over the whole router: every response gets the security headers,
//! and requests under the protected prefixes additionally need a valid
//! session plus the step-up grant cookie. Handlers behind the guard receive
//! the authenticated [`Principal`] through request extensions.

use axum::{
    body::Body,
    extract::State,
    http::{header::HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use sqlx::PgPool;

use super::handlers::auth::{principal::require_auth, session::has_access_grant};

/// URL prefixes that require a session and the step-up grant.
const PROTECTED_PREFIXES: &[&str] = &["/v1/lots", "/v1/logs", "/v1/user", "/v1/dashboard"];

const LOGIN_PATH: &str = "/login";
const VERIFY_ACCESS_PATH: &str = "/verify-access";

const CSP: &str = "default-src 'self'; script-src 'self' 'unsafe-inline' 'unsafe-eval'; \
                   style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; \
                   font-src 'self' data:;";

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    (
        "permissions-policy",
        "camera=(), microphone=(), geolocation=()",
    ),
    ("content-security-policy", CSP),
];

#[derive(Clone)]
pub struct GuardState {
    pool: PgPool,
}

impl GuardState {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub async fn guard(
    State(state): State<GuardState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_protected(request.uri().path()) {
        let principal = match require_auth(request.headers(), &state.pool).await {
            Ok(principal) => principal,
            Err(StatusCode::UNAUTHORIZED) => {
                return with_security_headers(Redirect::temporary(LOGIN_PATH).into_response());
            }
            Err(status) => {
                return with_security_headers(status.into_response());
            }
        };

        // Session alone is not enough for the dashboard surface; the grant
        // cookie must also be present and literal.
        if !has_access_grant(request.headers()) {
            return with_security_headers(
                Redirect::temporary(VERIFY_ACCESS_PATH).into_response(),
            );
        }

        request.extensions_mut().insert(principal);
    }

    with_security_headers(next.run(request).await)
}

pub(crate) fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
}

fn with_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    fn guarded_app() -> Router {
        // Lazy pool: the no-session branch must redirect before any query.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://user@127.0.0.1:1/beanledger")
            .expect("lazy pool");
        Router::new()
            .route("/v1/lots", get(|| async { "lots" }))
            .route("/health", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(GuardState::new(pool), guard))
    }

    #[tokio::test]
    async fn missing_session_redirects_to_login() {
        let response = guarded_app()
            .oneshot(
                Request::builder()
                    .uri("/v1/lots")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response
                .headers()
                .get("location")
                .and_then(|value| value.to_str().ok()),
            Some(LOGIN_PATH)
        );
        // Redirects carry the security headers too.
        assert!(response.headers().contains_key("content-security-policy"));
    }

    #[tokio::test]
    async fn public_route_passes_without_session() {
        let response = guarded_app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-frame-options"));
    }

    #[test]
    fn protected_prefixes_match_exact_and_nested() {
        assert!(is_protected("/v1/lots"));
        assert!(is_protected("/v1/lots/123"));
        assert!(is_protected("/v1/logs"));
        assert!(is_protected("/v1/user/change-password"));
        assert!(is_protected("/v1/dashboard"));
    }

    #[test]
    fn public_paths_pass() {
        assert!(!is_protected("/health"));
        assert!(!is_protected("/v1/auth/login"));
        assert!(!is_protected("/v1/lotsandmore"));
        assert!(!is_protected("/"));
    }

    #[test]
    fn security_headers_applied() {
        let response = with_security_headers(StatusCode::OK.into_response());
        let headers = response.headers();
        assert_eq!(
            headers.get("x-frame-options").map(|v| v.to_str().ok()),
            Some(Some("DENY"))
        );
        assert_eq!(
            headers
                .get("x-content-type-options")
                .and_then(|v| v.to_str().ok()),
            Some("nosniff")
        );
        assert!(headers.contains_key("content-security-policy"));
        assert!(headers.contains_key("referrer-policy"));
        assert!(headers.contains_key("permissions-policy"));
    }
}
