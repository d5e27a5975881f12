//! Persistence seams for admin accounts and one-time-code challenges.
//!
//! The subsystem never talks to a database directly; it goes through these
//! object-safe traits so the Postgres backend and the in-memory backend are
//! interchangeable, and tests run against fakes with no infrastructure.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::account::{AdminAccount, SessionUpdate};
use super::otp::OtpChallenge;
use super::permission::Role;

/// Outcome when inserting a new admin record.
#[derive(Debug)]
pub enum InsertOutcome {
    Created,
    /// Username already taken; not an error, callers decide.
    Conflict,
}

/// Credential-store operations.
///
/// `assign_session` must be a single atomic record update: two concurrent
/// logins race to overwrite `current_session_id` and the store's row-level
/// atomicity is the only synchronization relied upon.
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn lookup(&self, username: &str) -> Result<Option<AdminAccount>>;

    async fn insert(&self, account: AdminAccount) -> Result<InsertOutcome>;

    /// Number of accounts holding the given role; used by the bootstrap gate.
    async fn count_role(&self, role: Role) -> Result<i64>;

    /// Bump `last_login` and `login_count` after a successful password check.
    async fn record_login(&self, username: &str) -> Result<()>;

    /// Atomically overwrite the current session pointer (and optionally the
    /// push-token list) for the account.
    async fn assign_session(&self, username: &str, update: &SessionUpdate) -> Result<()>;

    /// Durably set `is_active` to false.
    async fn deactivate(&self, username: &str) -> Result<()>;
}

/// One-time-code challenge operations.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert(&self, challenge: OtpChallenge) -> Result<()>;

    /// Look up the newest unused challenge matching `(username, code)`.
    ///
    /// Lookup is per-code, not "latest only": a client may legitimately
    /// redeem a code it already holds even after a newer one was issued.
    async fn find(&self, username: &str, code: &str) -> Result<Option<OtpChallenge>>;

    /// Flip `used` from false to true exactly once. Returns whether this call
    /// made the transition; a second caller sees `false`.
    async fn mark_used(&self, id: Uuid) -> Result<bool>;

    /// Atomically bump the attempt counter. Targets the exact
    /// `(username, code)` record when one exists, otherwise the most recently
    /// issued unused challenge for the username so blind guesses still count.
    async fn increment_attempts(&self, username: &str, code: &str) -> Result<()>;
}
