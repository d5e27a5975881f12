//! Two-phase login state machine and the bot/service token flow.
//!
//! Flow Overview:
//! 1) `start_login` verifies the password. With the second factor disabled it
//!    finishes the login immediately; otherwise it sends a one-time code out
//!    of band and returns a `temp_2fa` token as the awaiting-second-factor
//!    marker. The session pointer is not touched in that branch.
//! 2) `complete_login` redeems the code, overwrites `current_session_id` in
//!    one atomic write (the moment the new session supersedes any other), and
//!    mints the interactive token.
//! 3) `request_service_otp` / `redeem_service_otp` mirror the code exchange
//!    but mint a non-expiring service token and never read or write the
//!    session pointer; an admin keeps one interactive session and any number
//!    of service tokens at the same time.
//!
//! Security boundaries:
//! - Unknown usernames and wrong passwords return the same generic error.
//! - Code rejections are collapsed to one message; attempt counts are never
//!   disclosed.
//! - Code delivery and activity recording are best-effort and never change
//!   the authentication outcome.

use std::sync::Arc;
use tracing::{error, info};

use super::account::{AdminAccount, SessionUpdate};
use super::activity::{ActivityEvent, ActivityKind, ActivitySink};
use super::error::AuthError;
use super::notify::OtpDelivery;
use super::otp::{OtpService, OtpVerification};
use super::password::verify_password;
use super::permission::Role;
use super::store::AdminStore;
use super::token::TokenSigner;
use super::utils::generate_session_id;

/// Bearer credential handed back to a successfully authenticated caller.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until expiry; `None` for the immortal service class.
    pub expires_in: Option<i64>,
    pub username: String,
    pub role: Role,
}

/// Result of login step 1.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Second factor disabled: the login is complete.
    Authenticated(IssuedToken),
    /// Second factor enabled: redeem the delivered code via `complete_login`.
    SecondFactorRequired { temp_token: String, expires_in: i64 },
}

/// Orchestrates password checks, one-time codes, session assignment, and
/// token issuance. Constructed once at process start with its collaborators.
pub struct LoginFlow {
    store: Arc<dyn AdminStore>,
    otp: OtpService,
    signer: Arc<TokenSigner>,
    delivery: Arc<dyn OtpDelivery>,
    activity: Arc<dyn ActivitySink>,
    second_factor_enabled: bool,
}

impl LoginFlow {
    #[must_use]
    pub fn new(
        store: Arc<dyn AdminStore>,
        otp: OtpService,
        signer: Arc<TokenSigner>,
        delivery: Arc<dyn OtpDelivery>,
        activity: Arc<dyn ActivitySink>,
        second_factor_enabled: bool,
    ) -> Self {
        Self {
            store,
            otp,
            signer,
            delivery,
            activity,
            second_factor_enabled,
        }
    }

    /// Login step 1: verify `username`/`password`.
    ///
    /// # Errors
    /// `InvalidCredentials` for unknown usernames and wrong passwords alike,
    /// `AccountDisabled` / `AccountExpired` for unusable accounts, or
    /// `Internal` on store failure.
    pub async fn start_login(
        &self,
        username: &str,
        password: &str,
        ip: &str,
        user_agent: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let account = self.store.lookup(username).await?;
        let Some(account) = account else {
            self.record(
                ActivityEvent::new(username, ActivityKind::Login, "Failed login attempt", ip)
                    .with_user_agent(user_agent)
                    .failed("Invalid credentials"),
            )
            .await;
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &account.password_hash) {
            self.record(
                ActivityEvent::new(username, ActivityKind::Login, "Failed login attempt", ip)
                    .with_user_agent(user_agent)
                    .failed("Invalid credentials"),
            )
            .await;
            return Err(AuthError::InvalidCredentials);
        }

        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }

        if account.is_expired(time::OffsetDateTime::now_utc()) {
            // The disablement is durable, not merely a per-request verdict.
            self.store.deactivate(username).await?;
            return Err(AuthError::AccountExpired);
        }

        self.store.record_login(username).await?;

        if !self.second_factor_enabled {
            let issued = self
                .establish_session(&account, ip, user_agent, None)
                .await?;
            self.record(
                ActivityEvent::new(
                    username,
                    ActivityKind::Login,
                    "Successful login (second factor disabled)",
                    ip,
                )
                .with_user_agent(user_agent),
            )
            .await;
            info!(username = %username, "admin logged in without second factor");
            return Ok(LoginOutcome::Authenticated(issued));
        }

        let code = self.otp.issue(username, ip).await?;
        // Fire-and-forget: the code stays redeemable even if delivery fails.
        if let Err(err) = self.delivery.deliver_otp(username, ip, &code, None).await {
            error!("Failed to deliver one-time code: {err}");
        }

        let temp_token = self.signer.issue_temp(username)?;
        self.record(
            ActivityEvent::new(
                username,
                ActivityKind::Login,
                "Login step 1: password verified, code sent",
                ip,
            )
            .with_user_agent(user_agent)
            .with_metadata(serde_json::json!({ "step": "otp_sent" })),
        )
        .await;
        info!(username = %username, "login step 1 complete, awaiting code");

        Ok(LoginOutcome::SecondFactorRequired {
            temp_token,
            expires_in: self.signer.temp_ttl_seconds(),
        })
    }

    /// Login step 2: redeem the one-time code and mint the interactive
    /// session. This write is where any previous session is superseded.
    ///
    /// # Errors
    /// `InvalidOrExpiredTempToken` when the step-1 token is invalid or bound
    /// to another username, `InvalidOrExpiredCode` for any code rejection,
    /// `NotFound` / `AccountDisabled` for unusable accounts, or `Internal`.
    pub async fn complete_login(
        &self,
        temp_token: &str,
        username: &str,
        code: &str,
        ip: &str,
        user_agent: &str,
        push_token: Option<String>,
    ) -> Result<IssuedToken, AuthError> {
        let token_username = self
            .signer
            .validate_temp(temp_token)
            .map_err(|_| AuthError::InvalidOrExpiredTempToken)?;
        // Defense against token/field mismatch.
        if token_username != username {
            return Err(AuthError::InvalidOrExpiredTempToken);
        }

        if let OtpVerification::Rejected(rejection) = self.otp.verify(username, code, ip).await? {
            if let Err(err) = self.otp.increment_attempts(username, code).await {
                error!("Failed to increment code attempts: {err}");
            }
            self.record(
                ActivityEvent::new(username, ActivityKind::Login, "Failed code verification", ip)
                    .with_user_agent(user_agent)
                    .failed("Invalid or expired code")
                    .with_metadata(serde_json::json!({ "rejection": format!("{rejection:?}") })),
            )
            .await;
            return Err(AuthError::InvalidOrExpiredCode);
        }

        let account = self
            .store
            .lookup(username)
            .await?
            .ok_or(AuthError::NotFound)?;
        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let issued = self
            .establish_session(&account, ip, user_agent, push_token)
            .await?;
        self.record(
            ActivityEvent::new(
                username,
                ActivityKind::Login,
                "Login step 2: code verified, login complete",
                ip,
            )
            .with_user_agent(user_agent)
            .with_metadata(serde_json::json!({ "step": "otp_verified" })),
        )
        .await;
        info!(username = %username, "second factor verified, admin logged in");

        Ok(issued)
    }

    /// Bot/service step 1: issue a code for a named automated caller.
    ///
    /// Returns the code's lifetime in seconds. No token is minted and the
    /// session pointer is untouched.
    ///
    /// # Errors
    /// `NotFound` for unknown accounts, `AccountDisabled`, or `Internal`.
    pub async fn request_service_otp(
        &self,
        username: &str,
        caller_id: &str,
        ip: &str,
    ) -> Result<i64, AuthError> {
        let account = self
            .store
            .lookup(username)
            .await?
            .ok_or(AuthError::NotFound)?;
        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let code = self.otp.issue(username, ip).await?;
        let prefix = format!("Service authentication request\nCaller: {caller_id}\n");
        if let Err(err) = self
            .delivery
            .deliver_otp(username, ip, &code, Some(&prefix))
            .await
        {
            error!("Failed to deliver service code: {err}");
        }

        self.record(
            ActivityEvent::new(
                username,
                ActivityKind::Login,
                &format!("Service code requested: {caller_id}"),
                ip,
            ),
        )
        .await;
        info!(username = %username, caller = %caller_id, "service code issued");

        Ok(self.otp.ttl_seconds())
    }

    /// Bot/service step 2: redeem the code for a non-expiring service token.
    ///
    /// # Errors
    /// `InvalidOrExpiredCode` for any code rejection, `NotFound` /
    /// `AccountDisabled` for unusable accounts, or `Internal`.
    pub async fn redeem_service_otp(
        &self,
        username: &str,
        code: &str,
        caller_id: &str,
        ip: &str,
        user_agent: &str,
    ) -> Result<IssuedToken, AuthError> {
        if let OtpVerification::Rejected(rejection) = self.otp.verify(username, code, ip).await? {
            if let Err(err) = self.otp.increment_attempts(username, code).await {
                error!("Failed to increment code attempts: {err}");
            }
            self.record(
                ActivityEvent::new(
                    username,
                    ActivityKind::Login,
                    &format!("Service code verification failed: {caller_id}"),
                    ip,
                )
                .with_user_agent(user_agent)
                .failed("Invalid or expired code")
                .with_metadata(serde_json::json!({ "rejection": format!("{rejection:?}") })),
            )
            .await;
            return Err(AuthError::InvalidOrExpiredCode);
        }

        let account = self
            .store
            .lookup(username)
            .await?
            .ok_or(AuthError::NotFound)?;
        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let access_token = self
            .signer
            .issue_service(&account.username, account.role, caller_id)?;
        self.record(
            ActivityEvent::new(
                username,
                ActivityKind::Login,
                &format!("Service caller authenticated: {caller_id}"),
                ip,
            )
            .with_user_agent(user_agent)
            .with_metadata(serde_json::json!({ "caller": caller_id })),
        )
        .await;
        info!(username = %username, caller = %caller_id, "service token issued");

        Ok(IssuedToken {
            access_token,
            token_type: "bearer",
            expires_in: None,
            username: account.username,
            role: account.role,
        })
    }

    /// Advisory logout: records the event only.
    ///
    /// `current_session_id` is deliberately left in place; the next login
    /// overwrites it, so clearing here would add nothing to the invariant.
    pub async fn logout(&self, account: &AdminAccount, ip: &str, user_agent: &str) {
        self.record(
            ActivityEvent::new(&account.username, ActivityKind::Logout, "Logged out", ip)
                .with_user_agent(user_agent),
        )
        .await;
        info!(username = %account.username, "admin logged out");
    }

    async fn establish_session(
        &self,
        account: &AdminAccount,
        ip: &str,
        user_agent: &str,
        push_token: Option<String>,
    ) -> Result<IssuedToken, AuthError> {
        let session_id = generate_session_id()?;
        let update = SessionUpdate {
            session_id: session_id.clone(),
            ip: ip.to_string(),
            device: user_agent.to_string(),
            push_token,
        };
        // The single write that invalidates every previously issued
        // interactive token for this account.
        self.store.assign_session(&account.username, &update).await?;

        let access_token = self
            .signer
            .issue_interactive(&account.username, account.role, &session_id)?;

        Ok(IssuedToken {
            access_token,
            token_type: "bearer",
            expires_in: Some(self.signer.interactive_ttl_seconds()),
            username: account.username.clone(),
            role: account.role,
        })
    }

    async fn record(&self, event: ActivityEvent) {
        if let Err(err) = self.activity.record(event).await {
            error!("Failed to record admin activity: {err}");
        }
    }
}
