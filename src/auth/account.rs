//! Admin identity records and session-update payloads.

use time::OffsetDateTime;

use super::permission::{Permission, Role};

/// Persisted admin record.
///
/// `current_session_id` is the sole authority for interactive-token
/// validity: assigning a new identifier immediately invalidates every
/// previously issued interactive token for the account, regardless of each
/// token's own expiry.
#[derive(Clone, Debug)]
pub struct AdminAccount {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub is_active: bool,
    /// Opaque capability string identifying devices this admin owns; consumed
    /// by the device pipeline, never mutated here.
    pub device_token: Option<String>,
    /// Absolute deadline after which the account is auto-disabled.
    pub expires_at: Option<OffsetDateTime>,
    pub current_session_id: Option<String>,
    pub last_session_ip: Option<String>,
    pub last_session_device: Option<String>,
    /// Push-notification targets; replaced wholesale on login so only the
    /// most recent device receives pushes.
    pub push_tokens: Vec<String>,
    pub last_login: Option<OffsetDateTime>,
    pub login_count: i64,
    pub created_by: Option<String>,
    pub created_at: OffsetDateTime,
}

impl AdminAccount {
    /// Whether the account's expiry deadline, if any, has passed.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }

    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// Input for creating a new admin account.
#[derive(Clone, Debug)]
pub struct NewAdmin {
    pub username: String,
    pub password: String,
    pub role: Role,
    /// Explicit permission override; when empty the role's default set is
    /// derived at creation time.
    pub permissions: Vec<Permission>,
    pub expires_at: Option<OffsetDateTime>,
}

/// One atomic session assignment.
///
/// Applied as a single row update; this write is the only synchronization
/// point for session supersession, and last writer wins by design.
#[derive(Clone, Debug)]
pub struct SessionUpdate {
    pub session_id: String,
    pub ip: String,
    pub device: String,
    /// When present, replaces the stored push-token list with exactly this
    /// one entry (single-device push semantics).
    pub push_token: Option<String>,
}
