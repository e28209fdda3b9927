//! Auth configuration and shared state.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use super::rate_limit::RateLimitStore;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_ACCESS_GRANT_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Substrings that mark a secret as a sample value from the deployment docs.
/// A master code containing one of these is treated as not configured.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "your-secret-key-here",
    "change-this",
    "example",
    "placeholder",
    "xxx",
    "your_",
    "your-",
];

#[derive(Clone)]
pub struct AuthConfig {
    frontend_base_url: String,
    master_access_code: Option<SecretString>,
    session_ttl_seconds: i64,
    access_grant_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            master_access_code: None,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            access_grant_ttl_seconds: DEFAULT_ACCESS_GRANT_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_master_access_code(mut self, code: Option<SecretString>) -> Self {
        self.master_access_code = code;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_access_grant_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_grant_ttl_seconds = seconds;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(crate) fn access_grant_ttl_seconds(&self) -> i64 {
        self.access_grant_ttl_seconds
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    pub(crate) fn cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }

    /// The operator-configured step-up code, or `None` when it is missing or
    /// still a sample value. Callers must not leak which of the two it was.
    pub(super) fn master_access_code(&self) -> Option<&str> {
        let code = self.master_access_code.as_ref()?;
        let exposed = code.expose_secret();
        if exposed.is_empty() || is_placeholder_value(exposed) {
            return None;
        }
        Some(exposed)
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("frontend_base_url", &self.frontend_base_url)
            .field("master_access_code", &"***")
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("access_grant_ttl_seconds", &self.access_grant_ttl_seconds)
            .finish()
    }
}

fn is_placeholder_value(value: &str) -> bool {
    let lower = value.to_lowercase();
    PLACEHOLDER_MARKERS.iter().any(|p| lower.contains(p))
}

/// Shared auth state attached to the router as an extension.
pub struct AuthState {
    config: AuthConfig,
    rate_limiter: Arc<dyn RateLimitStore>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, rate_limiter: Arc<dyn RateLimitStore>) -> Self {
        Self {
            config,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn rate_limiter(&self) -> &dyn RateLimitStore {
        self.rate_limiter.as_ref()
    }
}
