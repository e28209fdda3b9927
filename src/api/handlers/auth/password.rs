//! Password hashing, verification, and strength validation.
//!
//! Stored hashes come in two formats:
//!
//! - **Current**: `hex(salt):hex(key)` produced by PBKDF2-HMAC-SHA256 with a
//!   random per-user salt.
//! - **Legacy**: a bare SHA-256 hex digest with no salt, predating the salted
//!   scheme. Verification still accepts it so existing accounts keep working;
//!   callers rehash on the first successful login (see the login handler).

use anyhow::{Context, Result};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const ITERATIONS: u32 = 100_000;
const KEY_LENGTH: usize = 32;
const SALT_LENGTH: usize = 16;

/// Derive a salted hash for storage in the `users.password` column.
///
/// Two calls with the same password yield different strings (random salt).
///
/// # Errors
/// Returns an error if the system RNG fails to produce a salt.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng
        .try_fill_bytes(&mut salt)
        .context("failed to generate password salt")?;

    let key = derive_key(password, &salt);
    Ok(format!("{}:{}", hex::encode(salt), hex::encode(key)))
}

/// Verify a password against a stored hash in either format.
///
/// A malformed or missing `salt:key` split falls back to the legacy unsalted
/// SHA-256 comparison rather than rejecting outright.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, key_hex)) = split_stored(stored) else {
        return verify_legacy(password, stored);
    };

    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };

    let derived = hex::encode(derive_key(password, &salt));
    constant_time_eq(derived.as_bytes(), key_hex.as_bytes())
}

/// Whether a stored hash predates the salted scheme.
#[must_use]
pub fn is_legacy_hash(stored: &str) -> bool {
    split_stored(stored).is_none()
}

/// Outcome of the password strength rules.
#[derive(Debug)]
pub struct StrengthReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Check all strength rules independently; every failing rule contributes its
/// own message so the client can show the full list.
#[must_use]
pub fn validate_strength(password: &str) -> StrengthReport {
    let mut errors = Vec::new();

    if password.chars().count() < 8 {
        errors.push("Password must be at least 8 characters long".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one digit".to_string());
    }
    if password.chars().all(char::is_alphanumeric) {
        errors.push("Password must contain at least one special character".to_string());
    }

    StrengthReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Constant-time equality for secret material.
///
/// Length mismatch is the only early exit; equal-length inputs are compared
/// across their full width so timing does not reveal the mismatch position.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, ITERATIONS, &mut key);
    key
}

fn verify_legacy(password: &str, stored: &str) -> bool {
    let digest = hex::encode(Sha256::digest(password.as_bytes()));
    constant_time_eq(digest.as_bytes(), stored.as_bytes())
}

fn split_stored(stored: &str) -> Option<(&str, &str)> {
    let (salt_hex, key_hex) = stored.split_once(':')?;
    if salt_hex.is_empty() || key_hex.is_empty() {
        return None;
    }
    Some((salt_hex, key_hex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sha2::{Digest, Sha256};

    #[test]
    fn hash_then_verify_round_trips() -> Result<()> {
        let stored = hash_password("Correct-Horse1!")?;
        assert!(verify_password("Correct-Horse1!", &stored));
        assert!(!verify_password("correct-horse1!", &stored));
        Ok(())
    }

    #[test]
    fn hash_is_salted_per_call() -> Result<()> {
        let first = hash_password("Correct-Horse1!")?;
        let second = hash_password("Correct-Horse1!")?;
        assert_ne!(first, second);
        // Both still verify despite differing salts.
        assert!(verify_password("Correct-Horse1!", &first));
        assert!(verify_password("Correct-Horse1!", &second));
        Ok(())
    }

    #[test]
    fn wrong_password_rejected() -> Result<()> {
        let stored = hash_password("Abcdef1!")?;
        assert!(!verify_password("Abcdef2!", &stored));
        Ok(())
    }

    #[test]
    fn stored_format_is_salt_colon_key() -> Result<()> {
        let stored = hash_password("Abcdef1!")?;
        let (salt_hex, key_hex) = stored.split_once(':').expect("missing separator");
        assert_eq!(salt_hex.len(), SALT_LENGTH * 2);
        assert_eq!(key_hex.len(), KEY_LENGTH * 2);
        assert!(stored.chars().all(|c| c.is_ascii_hexdigit() || c == ':'));
        Ok(())
    }

    #[test]
    fn legacy_digest_accepted() {
        let legacy = hex::encode(Sha256::digest(b"secret123"));
        assert!(is_legacy_hash(&legacy));
        assert!(verify_password("secret123", &legacy));
        assert!(!verify_password("secret124", &legacy));
    }

    #[test]
    fn current_format_not_flagged_legacy() -> Result<()> {
        let stored = hash_password("Abcdef1!")?;
        assert!(!is_legacy_hash(&stored));
        Ok(())
    }

    #[test]
    fn empty_salt_or_key_treated_as_legacy() {
        assert!(is_legacy_hash(":abcdef"));
        assert!(is_legacy_hash("abcdef:"));
        assert!(is_legacy_hash("plain-digest"));
    }

    #[test]
    fn strength_reports_every_violation() {
        let report = validate_strength("abc");
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 5);
    }

    #[test]
    fn strength_accepts_compliant_password() {
        let report = validate_strength("Abcdef1!");
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn strength_rules_are_independent() {
        // Long, mixed case, digits, but no symbol: exactly one violation.
        let report = validate_strength("Abcdefg123");
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("special character"));
    }

    #[test]
    fn constant_time_eq_differs_anywhere() {
        assert!(constant_time_eq(b"secret-code", b"secret-code"));
        // Mismatch in the first byte and in the last byte both return false.
        assert!(!constant_time_eq(b"Xecret-code", b"secret-code"));
        assert!(!constant_time_eq(b"secret-codX", b"secret-code"));
        // Length mismatch short-circuits.
        assert!(!constant_time_eq(b"secret", b"secret-code"));
    }
}
