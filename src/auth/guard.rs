//! Bearer-token gate for protected operations.
//!
//! A pure validation pipeline, no state of its own: validate the token, fail
//! closed; resolve the account; enforce active/expiry; then branch on the
//! token class. Service tokens skip the session comparison entirely;
//! interactive tokens must match the account's `current_session_id` exactly.
//! Session-related rejections all read the same to the caller; the concrete
//! reason is kept in the error for logs.

use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::account::AdminAccount;
use super::error::{AuthError, SessionRejection};
use super::permission::Permission;
use super::store::AdminStore;
use super::token::{TokenClaims, TokenSigner};

pub struct AccessGuard {
    store: Arc<dyn AdminStore>,
    signer: Arc<TokenSigner>,
}

impl AccessGuard {
    #[must_use]
    pub fn new(store: Arc<dyn AdminStore>, signer: Arc<TokenSigner>) -> Self {
        Self { store, signer }
    }

    /// Resolve a bearer token into the admin account it authenticates.
    ///
    /// # Errors
    /// `Unauthorized` on token or session failures, `AccountDisabled` /
    /// `AccountExpired` for unusable accounts, or `Internal` on store
    /// failure. An expired account is durably disabled as a side effect.
    pub async fn authorize(&self, bearer_token: &str) -> Result<AdminAccount, AuthError> {
        let claims = self.signer.validate(bearer_token).map_err(|err| {
            debug!("bearer token rejected: {err}");
            AuthError::Unauthorized(SessionRejection::BadToken)
        })?;

        let username = claims.subject().to_string();
        let Some(account) = self.store.lookup(&username).await? else {
            debug!(username = %username, "token subject no longer resolves");
            return Err(AuthError::Unauthorized(SessionRejection::UnknownAdmin));
        };

        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }

        if account.is_expired(OffsetDateTime::now_utc()) {
            // Auto-disable on expiry: the flip is durable, not just a verdict.
            self.store.deactivate(&username).await?;
            warn!(username = %username, "admin account passed expiry; durably disabled");
            return Err(AuthError::AccountExpired);
        }

        match claims {
            // Service tokens bypass the session comparison; `is_active` is
            // their only kill switch.
            TokenClaims::Service { .. } => Ok(account),
            TokenClaims::Interactive { session_id, .. } => {
                let Some(current) = account.current_session_id.as_deref() else {
                    debug!(username = %username, "no active session on account");
                    return Err(AuthError::Unauthorized(SessionRejection::NoActiveSession));
                };
                if session_id != current {
                    debug!(username = %username, "interactive token superseded by newer login");
                    return Err(AuthError::Unauthorized(SessionRejection::Superseded));
                }
                Ok(account)
            }
            // Step-1 markers are redeemable only through `complete_login`.
            TokenClaims::Temp2fa { .. } => {
                debug!(username = %username, "temp token presented to guard");
                Err(AuthError::Unauthorized(SessionRejection::BadToken))
            }
        }
    }
}

/// Downstream permission check for an already-authorized account.
///
/// # Errors
/// `Forbidden` naming the missing permission.
pub fn require_permission(account: &AdminAccount, permission: Permission) -> Result<(), AuthError> {
    if account.has_permission(permission) {
        Ok(())
    } else {
        Err(AuthError::Forbidden(permission))
    }
}
