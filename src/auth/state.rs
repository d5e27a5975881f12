//! Subsystem configuration and dependency wiring.
//!
//! Every component is constructed exactly once at process start with its
//! configuration and handed to the flows by reference; no process-wide
//! singletons, which is also what lets tests run against in-memory stores.

use secrecy::SecretString;
use std::sync::Arc;

use super::activity::ActivitySink;
use super::guard::AccessGuard;
use super::login::LoginFlow;
use super::notify::OtpDelivery;
use super::otp::OtpService;
use super::store::{AdminStore, OtpStore};
use super::token::TokenSigner;

const DEFAULT_INTERACTIVE_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_TEMP_TOKEN_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_OTP_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_OTP_MAX_ATTEMPTS: i64 = 5;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    token_secret: SecretString,
    second_factor_enabled: bool,
    interactive_token_ttl_seconds: i64,
    temp_token_ttl_seconds: i64,
    otp_ttl_seconds: i64,
    otp_max_attempts: i64,
}

impl AuthConfig {
    /// Defaults: second factor on, 24h interactive tokens, 5m temp tokens
    /// and codes, 5 code attempts.
    #[must_use]
    pub fn new(token_secret: SecretString) -> Self {
        Self {
            token_secret,
            second_factor_enabled: true,
            interactive_token_ttl_seconds: DEFAULT_INTERACTIVE_TOKEN_TTL_SECONDS,
            temp_token_ttl_seconds: DEFAULT_TEMP_TOKEN_TTL_SECONDS,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            otp_max_attempts: DEFAULT_OTP_MAX_ATTEMPTS,
        }
    }

    /// Deployment-wide second-factor toggle; there is no per-admin override.
    #[must_use]
    pub fn with_second_factor_enabled(mut self, enabled: bool) -> Self {
        self.second_factor_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_interactive_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.interactive_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_temp_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.temp_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp_max_attempts(mut self, attempts: i64) -> Self {
        self.otp_max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn token_secret(&self) -> &SecretString {
        &self.token_secret
    }

    #[must_use]
    pub fn second_factor_enabled(&self) -> bool {
        self.second_factor_enabled
    }

    #[must_use]
    pub fn interactive_token_ttl_seconds(&self) -> i64 {
        self.interactive_token_ttl_seconds
    }

    #[must_use]
    pub fn temp_token_ttl_seconds(&self) -> i64 {
        self.temp_token_ttl_seconds
    }

    #[must_use]
    pub fn otp_ttl_seconds(&self) -> i64 {
        self.otp_ttl_seconds
    }

    #[must_use]
    pub fn otp_max_attempts(&self) -> i64 {
        self.otp_max_attempts
    }
}

/// Fully wired subsystem: one login flow and one access guard sharing the
/// same stores and signer.
pub struct AuthState {
    config: AuthConfig,
    login: LoginFlow,
    guard: AccessGuard,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        admin_store: Arc<dyn AdminStore>,
        otp_store: Arc<dyn OtpStore>,
        delivery: Arc<dyn OtpDelivery>,
        activity: Arc<dyn ActivitySink>,
    ) -> Self {
        let signer = Arc::new(TokenSigner::new(
            config.token_secret(),
            config.interactive_token_ttl_seconds(),
            config.temp_token_ttl_seconds(),
        ));
        let otp = OtpService::new(
            otp_store,
            config.otp_ttl_seconds(),
            config.otp_max_attempts(),
        );
        let login = LoginFlow::new(
            Arc::clone(&admin_store),
            otp,
            Arc::clone(&signer),
            delivery,
            activity,
            config.second_factor_enabled(),
        );
        let guard = AccessGuard::new(admin_store, signer);
        Self {
            config,
            login,
            guard,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn login(&self) -> &LoginFlow {
        &self.login
    }

    #[must_use]
    pub fn guard(&self) -> &AccessGuard {
        &self.guard
    }
}
