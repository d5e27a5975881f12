//! Argon2id password hashing and verification.

use anyhow::{Context, Result};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};

/// Hash a password with a fresh random salt.
///
/// Two calls with the same input produce different PHC strings; both verify.
///
/// # Errors
/// Returns an error if the hashing primitive fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .context("failed to hash password")?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash.
///
/// Never fails: a malformed stored hash verifies as `false` rather than
/// erroring, so a corrupted record reads as a credential mismatch.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn same_password_hashes_differently_but_both_verify() -> Result<()> {
        let first = hash_password("secret123")?;
        let second = hash_password("secret123")?;
        assert_ne!(first, second);
        assert!(verify_password("secret123", &first));
        assert!(verify_password("secret123", &second));
        Ok(())
    }

    #[test]
    fn wrong_password_fails() -> Result<()> {
        let hash = hash_password("secret123")?;
        assert!(!verify_password("secret124", &hash));
        Ok(())
    }

    #[test]
    fn malformed_hash_verifies_false_instead_of_erroring() {
        assert!(!verify_password("secret123", "not-a-phc-string"));
        assert!(!verify_password("secret123", ""));
    }
}
