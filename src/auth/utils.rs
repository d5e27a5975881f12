//! Small helpers for opaque identifiers and bearer extraction.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::{rngs::OsRng, RngCore};

/// Create a new opaque session identifier.
///
/// Stored on the account and embedded in interactive tokens; equality is the
/// sole session-validity test, so the only requirement is unguessability.
///
/// # Errors
/// Returns an error if OS randomness is unavailable.
pub(super) fn generate_session_id() -> Result<String> {
    random_urlsafe().context("failed to generate session id")
}

/// Create a new opaque device capability token for a freshly created admin.
///
/// # Errors
/// Returns an error if OS randomness is unavailable.
pub(super) fn generate_device_token() -> Result<String> {
    random_urlsafe().context("failed to generate device token")
}

fn random_urlsafe() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Extract the token from an `Authorization: Bearer ...` header value.
///
/// Returns `None` for missing prefixes or empty tokens; the guard treats
/// both as an invalid bearer.
#[must_use]
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    let trimmed = header_value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_32_random_bytes() -> Result<()> {
        let id = generate_session_id()?;
        let decoded = URL_SAFE_NO_PAD
            .decode(id.as_bytes())
            .context("decode session id")?;
        assert_eq!(decoded.len(), 32);
        Ok(())
    }

    #[test]
    fn successive_session_ids_differ() -> Result<()> {
        assert_ne!(generate_session_id()?, generate_session_id()?);
        Ok(())
    }

    #[test]
    fn bearer_extraction_handles_case_and_whitespace() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("  Bearer   abc  "), Some("abc"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token(""), None);
    }
}
