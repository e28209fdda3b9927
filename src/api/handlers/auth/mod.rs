//! Auth handlers and supporting modules.
//!
//! Covers credential storage, session management, and the step-up access
//! gate that fronts the dashboard surface.
//!
//! ## Password format
//!
//! Stored passwords are `hex(salt):hex(key)` derived with PBKDF2-HMAC-SHA256.
//! Bare SHA-256 hex digests from the first deployment still verify; they are
//! rewritten to the current format on the next successful login.
//!
//! ## Step-up gate
//!
//! `/v1/auth/verify-access` checks a single operator-configured master code.
//! Attempts are limited to 3 per hour per client IP, counted before the code
//! is ever compared, and every denial lands in the audit log.

pub(crate) mod change_password;
pub(crate) mod login;
pub(crate) mod password;
pub(crate) mod principal;
pub(crate) mod rate_limit;
pub(crate) mod register;
pub(crate) mod session;
mod state;
mod storage;
pub(crate) mod types;
mod utils;
pub(crate) mod verify_access;

pub use principal::Principal;
pub use rate_limit::{spawn_sweeper, MemoryRateLimiter, RateLimitStore};
pub use state::{AuthConfig, AuthState};
pub(crate) use utils::sanitize_string;
