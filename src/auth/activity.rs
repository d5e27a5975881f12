//! Audit-trail seam for login, logout, and verification events.
//!
//! Recording is best-effort: a sink failure is logged by the caller and never
//! changes the authentication outcome.

use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivityKind {
    Login,
    Logout,
}

impl ActivityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
        }
    }
}

/// One auditable event emitted by the login flow or guard consumers.
#[derive(Clone, Debug)]
pub struct ActivityEvent {
    pub username: String,
    pub kind: ActivityKind,
    pub description: String,
    pub ip: String,
    pub user_agent: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
    pub timestamp: OffsetDateTime,
}

impl ActivityEvent {
    /// Convenience constructor stamped with the current time and empty
    /// metadata.
    #[must_use]
    pub fn new(username: &str, kind: ActivityKind, description: &str, ip: &str) -> Self {
        Self {
            username: username.to_string(),
            kind,
            description: description.to_string(),
            ip: ip.to_string(),
            user_agent: None,
            success: true,
            error_message: None,
            metadata: serde_json::Value::Null,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    #[must_use]
    pub fn failed(mut self, error_message: &str) -> Self {
        self.success = false;
        self.error_message = Some(error_message.to_string());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Activity persistence abstraction.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    /// Record one event; errors are the caller's to log and ignore.
    async fn record(&self, event: ActivityEvent) -> Result<()>;
}

/// Local dev sink that writes events to the log stream.
#[derive(Clone, Debug)]
pub struct LogActivitySink;

#[async_trait]
impl ActivitySink for LogActivitySink {
    async fn record(&self, event: ActivityEvent) -> Result<()> {
        info!(
            username = %event.username,
            kind = event.kind.as_str(),
            success = event.success,
            ip = %event.ip,
            description = %event.description,
            "admin activity"
        );
        Ok(())
    }
}
