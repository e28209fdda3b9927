//! # Beanledger (Coffee Trading API)
//!
//! `beanledger` is the HTTP API for a small coffee-trading operation: user
//! registration and login, inventory lot management, and an append-only audit
//! trail behind a step-up access gate.
//!
//! ## Authentication
//!
//! Sessions are opaque random tokens stored server-side as SHA-256 hashes;
//! the raw token only travels in an `HttpOnly` cookie. Passwords are stored
//! as PBKDF2-HMAC-SHA256 (`hex(salt):hex(key)`); bare SHA-256 digests from
//! the first deployment still verify and are upgraded on login.
//!
//! ## Step-up access
//!
//! Beyond a session, the dashboard surface (`/v1/lots`, `/v1/logs`,
//! `/v1/user`, `/v1/dashboard`) requires a short-lived grant cookie obtained
//! by submitting the operator-configured master access code. Attempts are
//! rate-limited per client IP and every outcome is audited.
//!
//! ## Audit trail
//!
//! Every security-relevant action and lot mutation appends one row to `logs`.
//! Lot mutations commit their audit row in the same transaction; event-style
//! entries (login, logout, denials) are best-effort appends.

pub mod api;
pub mod audit;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
