//! HS256 token minting and validation for the three token classes.
//!
//! Flow Overview:
//! 1) Build class-specific claims tagged with an explicit `client_type`.
//! 2) Sign with the process-wide symmetric secret.
//! 3) Validate by checking the signature first, then branching on the class
//!    tag for expiry, never inferring the class from a missing field.
//!
//! Service tokens carry no `exp` claim at all. That is the only class allowed
//! to be immortal, and only because the access guard skips the session
//! comparison for it and relies on the account's `is_active` flag as the kill
//! switch.

use anyhow::{Context, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use super::permission::Role;

/// Signed token payload, discriminated by the `client_type` claim.
///
/// The class is fixed at issuance and carried inside the signed payload;
/// every shape carries exactly the fields its class needs, so an interactive
/// token structurally cannot lack a session identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "client_type", rename_all = "snake_case")]
pub enum TokenClaims {
    /// Step-1 marker binding the client to a username until the one-time
    /// code is redeemed.
    #[serde(rename = "temp_2fa")]
    Temp2fa { sub: String, exp: i64 },
    /// Session-bound panel credential.
    Interactive {
        sub: String,
        role: Role,
        session_id: String,
        exp: i64,
    },
    /// Non-expiring credential for automated callers.
    Service {
        sub: String,
        role: Role,
        caller_id: String,
    },
}

impl TokenClaims {
    /// Username the token was issued for.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::Temp2fa { sub, .. } | Self::Interactive { sub, .. } | Self::Service { sub, .. } => {
                sub
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    /// Token verified but its class is not acceptable for this call site.
    #[error("token class not accepted here")]
    WrongClass,
}

/// Issues and validates signed tokens with a single symmetric key.
///
/// The key is process-wide configuration and is never rotated; rotation would
/// invalidate every outstanding token.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    interactive_ttl: Duration,
    temp_ttl: Duration,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: &SecretString, interactive_ttl_seconds: i64, temp_ttl_seconds: i64) -> Self {
        let key_bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(key_bytes),
            decoding: DecodingKey::from_secret(key_bytes),
            interactive_ttl: Duration::seconds(interactive_ttl_seconds),
            temp_ttl: Duration::seconds(temp_ttl_seconds),
        }
    }

    #[must_use]
    pub fn interactive_ttl_seconds(&self) -> i64 {
        self.interactive_ttl.whole_seconds()
    }

    #[must_use]
    pub fn temp_ttl_seconds(&self) -> i64 {
        self.temp_ttl.whole_seconds()
    }

    /// Issue a short-lived `temp_2fa` token for login step 2.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue_temp(&self, username: &str) -> Result<String> {
        let exp = (OffsetDateTime::now_utc() + self.temp_ttl).unix_timestamp();
        self.sign(&TokenClaims::Temp2fa {
            sub: username.to_string(),
            exp,
        })
    }

    /// Issue a session-bound interactive token.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue_interactive(&self, username: &str, role: Role, session_id: &str) -> Result<String> {
        let exp = (OffsetDateTime::now_utc() + self.interactive_ttl).unix_timestamp();
        self.sign(&TokenClaims::Interactive {
            sub: username.to_string(),
            role,
            session_id: session_id.to_string(),
            exp,
        })
    }

    /// Issue a non-expiring service token for an automated caller.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue_service(&self, username: &str, role: Role, caller_id: &str) -> Result<String> {
        self.sign(&TokenClaims::Service {
            sub: username.to_string(),
            role,
            caller_id: caller_id.to_string(),
        })
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .context("failed to sign token")
    }

    /// Validate signature and format, then expiry for the classes that have
    /// one. Service tokens pass with no expiry check.
    ///
    /// # Errors
    /// Fails with [`TokenError::InvalidSignature`], [`TokenError::Expired`],
    /// or [`TokenError::Malformed`].
    pub fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        // Library-level exp validation is disabled so the service class may
        // legally omit the claim; expiry is enforced per class below.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        let data = decode::<TokenClaims>(token, &self.decoding, &validation)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?;

        let now = OffsetDateTime::now_utc().unix_timestamp();
        match &data.claims {
            TokenClaims::Temp2fa { exp, .. } | TokenClaims::Interactive { exp, .. } => {
                if now >= *exp {
                    return Err(TokenError::Expired);
                }
            }
            TokenClaims::Service { .. } => {}
        }

        Ok(data.claims)
    }

    /// Validate a step-1 temporary token and return its username.
    ///
    /// # Errors
    /// Fails as [`Self::validate`] does, plus [`TokenError::WrongClass`] for
    /// any class other than `temp_2fa`.
    pub fn validate_temp(&self, token: &str) -> Result<String, TokenError> {
        match self.validate(token)? {
            TokenClaims::Temp2fa { sub, .. } => Ok(sub),
            TokenClaims::Interactive { .. } | TokenClaims::Service { .. } => {
                Err(TokenError::WrongClass)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    fn signer() -> TokenSigner {
        TokenSigner::new(&SecretString::from("unit-test-secret".to_string()), 60 * 60, 5 * 60)
    }

    #[test]
    fn interactive_round_trip_carries_session_id() -> Result<()> {
        let signer = signer();
        let token = signer.issue_interactive("alice", Role::Admin, "session-1")?;
        let claims = signer.validate(&token).map_err(anyhow::Error::from)?;
        match claims {
            TokenClaims::Interactive {
                sub,
                role,
                session_id,
                exp,
            } => {
                assert_eq!(sub, "alice");
                assert_eq!(role, Role::Admin);
                assert_eq!(session_id, "session-1");
                assert!(exp > OffsetDateTime::now_utc().unix_timestamp());
            }
            other => panic!("unexpected claims: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn service_token_payload_has_no_exp_claim() -> Result<()> {
        let signer = signer();
        let token = signer.issue_service("bot-admin", Role::Admin, "collector-1")?;

        let payload_b64 = token.split('.').nth(1).context("missing payload segment")?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64)?;
        let value: serde_json::Value = serde_json::from_slice(&payload)?;
        assert!(value.get("exp").is_none());
        assert_eq!(value["client_type"], "service");

        let claims = signer.validate(&token).map_err(anyhow::Error::from)?;
        assert_eq!(claims.subject(), "bot-admin");
        Ok(())
    }

    #[test]
    fn tampered_token_fails_signature_check() -> Result<()> {
        let signer = signer();
        let token = signer.issue_temp("alice")?;
        let other = TokenSigner::new(&SecretString::from("different-secret".to_string()), 3600, 300);
        assert_eq!(other.validate(&token), Err(TokenError::InvalidSignature));
        Ok(())
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            signer().validate("not.a.token"),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn expired_temp_token_rejected() -> Result<()> {
        let signer = TokenSigner::new(&SecretString::from("unit-test-secret".to_string()), 3600, -10);
        let token = signer.issue_temp("alice")?;
        assert_eq!(signer.validate_temp(&token), Err(TokenError::Expired));
        Ok(())
    }

    #[test]
    fn validate_temp_rejects_other_classes() -> Result<()> {
        let signer = signer();
        let interactive = signer.issue_interactive("alice", Role::Viewer, "session-1")?;
        assert_eq!(
            signer.validate_temp(&interactive),
            Err(TokenError::WrongClass)
        );
        let temp = signer.issue_temp("alice")?;
        assert_eq!(signer.validate_temp(&temp).as_deref(), Ok("alice"));
        Ok(())
    }
}
