//! Out-of-band one-time-code delivery seam.
//!
//! Delivery is fire-and-forget: login step 1 must succeed and return its
//! temp token even when delivery fails, since the code stays redeemable if
//! the admin obtains it another way. Callers log delivery errors and move on.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Delivery abstraction for one-time codes (Telegram, push, etc.).
#[async_trait]
pub trait OtpDelivery: Send + Sync {
    /// Deliver a code or return an error; the error never blocks login.
    async fn deliver_otp(
        &self,
        username: &str,
        ip: &str,
        code: &str,
        message_prefix: Option<&str>,
    ) -> Result<()>;
}

/// Local dev delivery that logs the code instead of sending it anywhere.
#[derive(Clone, Debug)]
pub struct LogOtpDelivery;

#[async_trait]
impl OtpDelivery for LogOtpDelivery {
    async fn deliver_otp(
        &self,
        username: &str,
        ip: &str,
        code: &str,
        message_prefix: Option<&str>,
    ) -> Result<()> {
        info!(
            username = %username,
            ip = %ip,
            code = %code,
            prefix = message_prefix.unwrap_or(""),
            "otp delivery stub"
        );
        Ok(())
    }
}
