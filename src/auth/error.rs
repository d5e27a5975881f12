//! Error kinds surfaced by the authentication subsystem.
//!
//! All variants are terminal, user-facing outcomes; nothing here is retried
//! internally. The security-sensitive kinds deliberately carry generic
//! messages: unknown usernames and wrong passwords read the same, and a
//! superseded session reads exactly like an expired one.

use thiserror::Error;

use super::permission::Permission;

/// Internal reason a bearer was rejected by the access guard.
///
/// Carried for logs and telemetry only; the public message for every variant
/// is the same opaque "session expired" line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionRejection {
    /// Signature, format, or expiry failure on the token itself.
    BadToken,
    /// Token verified but the subject no longer resolves to an account.
    UnknownAdmin,
    /// Account has never logged in under session control.
    NoActiveSession,
    /// Token's session identifier does not match the account's current one;
    /// a later login elsewhere has superseded it.
    Superseded,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Username unknown or password mismatch; the caller cannot tell which.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Admin account is disabled")]
    AccountDisabled,

    /// Account passed its expiry deadline and has been durably disabled.
    #[error("Admin account has expired")]
    AccountExpired,

    #[error("Invalid or expired temporary token")]
    InvalidOrExpiredTempToken,

    /// One-time code rejected; wrong, expired, replayed, and over-limit codes
    /// all surface this same message.
    #[error("Invalid or expired code")]
    InvalidOrExpiredCode,

    /// Bearer token rejected. The embedded [`SessionRejection`] stays out of
    /// the message on purpose.
    #[error("Session expired, please log in again")]
    Unauthorized(SessionRejection),

    #[error("Permission denied: {0} required")]
    Forbidden(Permission),

    #[error("Admin not found")]
    NotFound,

    /// Store or signer infrastructure failure; not an authentication verdict.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Internal rejection detail for unauthorized outcomes, if any.
    #[must_use]
    pub fn session_rejection(&self) -> Option<SessionRejection> {
        match self {
            Self::Unauthorized(rejection) => Some(*rejection),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superseded_and_bad_token_share_public_message() {
        let superseded = AuthError::Unauthorized(SessionRejection::Superseded);
        let bad_token = AuthError::Unauthorized(SessionRejection::BadToken);
        assert_eq!(superseded.to_string(), bad_token.to_string());
        assert_ne!(
            superseded.session_rejection(),
            bad_token.session_rejection()
        );
    }

    #[test]
    fn credential_failure_message_is_generic() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid username or password"
        );
    }

    #[test]
    fn forbidden_names_the_missing_permission() {
        let err = AuthError::Forbidden(Permission::ManageAdmins);
        assert_eq!(err.to_string(), "Permission denied: manage_admins required");
    }
}
