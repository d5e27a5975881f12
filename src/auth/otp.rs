//! One-time-code challenges for the second login factor.
//!
//! Codes are 6-digit, time-boxed, single-use, and attempt-limited. Issuing a
//! new code does not invalidate older unexpired ones; verification looks up
//! by `(username, code)`, a deliberate choice so a client can retry a code it
//! already has in hand after a newer one was requested.
//!
//! Attempt counting is keyed to the individual challenge record. `verify`
//! itself never mutates on the failure path; the login flow calls
//! `increment_attempts` exactly once per failed verification, so the count
//! is bounded without double counting.

use anyhow::{Context, Result};
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::store::OtpStore;

/// Fixed code width in digits.
pub(crate) const CODE_DIGITS: u32 = 6;

/// Ephemeral second-factor challenge record.
#[derive(Clone, Debug)]
pub struct OtpChallenge {
    pub id: Uuid,
    pub username: String,
    pub code: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub used: bool,
    pub attempts: i64,
    pub source_ip: String,
}

/// Verification verdict.
#[derive(Debug, PartialEq, Eq)]
pub enum OtpVerification {
    Valid,
    Rejected(OtpRejection),
}

/// Why a code was rejected. Internal detail; callers surface one generic
/// message for all of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpRejection {
    /// No unused challenge matches `(username, code)`.
    NotFound,
    /// Challenge found but past its deadline.
    Expired,
    /// The attempt ceiling was already reached before this call.
    TooManyAttempts,
}

/// Issues and verifies one-time codes against a pluggable store.
#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    ttl: Duration,
    max_attempts: i64,
}

impl OtpService {
    #[must_use]
    pub fn new(store: Arc<dyn OtpStore>, ttl_seconds: i64, max_attempts: i64) -> Self {
        Self {
            store,
            ttl: Duration::seconds(ttl_seconds),
            max_attempts,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.whole_seconds()
    }

    /// Issue a fresh code for the username and persist the challenge.
    ///
    /// Prior unexpired challenges are left in place; the latest code is the
    /// one a client is told about, but each remains redeemable on its own.
    ///
    /// # Errors
    /// Returns an error if code generation or persistence fails.
    pub async fn issue(&self, username: &str, source_ip: &str) -> Result<String> {
        let code = generate_code()?;
        let now = OffsetDateTime::now_utc();
        let challenge = OtpChallenge {
            id: Uuid::new_v4(),
            username: username.to_string(),
            code: code.clone(),
            created_at: now,
            expires_at: now + self.ttl,
            used: false,
            attempts: 0,
            source_ip: source_ip.to_string(),
        };
        self.store.insert(challenge).await?;
        Ok(code)
    }

    /// Verify a code. On success the challenge is atomically marked used; a
    /// replay of the same code is `NotFound`.
    ///
    /// The failure path performs no writes; see `increment_attempts`.
    ///
    /// # Errors
    /// Returns an error only on store failure; rejections are verdicts.
    pub async fn verify(
        &self,
        username: &str,
        code: &str,
        _source_ip: &str,
    ) -> Result<OtpVerification> {
        let Some(challenge) = self.store.find(username, code).await? else {
            return Ok(OtpVerification::Rejected(OtpRejection::NotFound));
        };

        if OffsetDateTime::now_utc() > challenge.expires_at {
            return Ok(OtpVerification::Rejected(OtpRejection::Expired));
        }

        if challenge.attempts >= self.max_attempts {
            return Ok(OtpVerification::Rejected(OtpRejection::TooManyAttempts));
        }

        // Lost the race against a concurrent redemption of the same code.
        if !self.store.mark_used(challenge.id).await? {
            return Ok(OtpVerification::Rejected(OtpRejection::NotFound));
        }

        Ok(OtpVerification::Valid)
    }

    /// Record one failed verification against the challenge counter.
    ///
    /// # Errors
    /// Returns an error if the store update fails.
    pub async fn increment_attempts(&self, username: &str, code: &str) -> Result<()> {
        self.store.increment_attempts(username, code).await
    }
}

/// Generate a fixed-width numeric code from OS randomness.
fn generate_code() -> Result<String> {
    let mut bytes = [0u8; 4];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate one-time code")?;
    let modulus = 10u32.pow(CODE_DIGITS);
    let value = u32::from_be_bytes(bytes) % modulus;
    Ok(format!("{value:0width$}", width = CODE_DIGITS as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_fixed_width_numeric() -> Result<()> {
        for _ in 0..32 {
            let code = generate_code()?;
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
        Ok(())
    }

    #[test]
    fn rejection_reasons_are_distinct() {
        assert_ne!(OtpRejection::NotFound, OtpRejection::Expired);
        assert_ne!(OtpRejection::Expired, OtpRejection::TooManyAttempts);
    }
}
