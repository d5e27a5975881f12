//! # Gardisto (Admin Authentication & Session Control)
//!
//! `gardisto` is the authentication authority for a device-management admin
//! panel. It implements the two-phase admin login flow (password plus an
//! optional one-time-code second factor), single-active-session enforcement,
//! and role-based authorization, and exposes them as plain data-in/data-out
//! APIs for the HTTP layer to consume.
//!
//! ## Single Active Session
//!
//! Each admin account holds at most one `current_session_id`. Every
//! successful interactive login mints a fresh identifier and overwrites the
//! stored one in a single atomic row update; the session identifier embedded
//! in older interactive tokens no longer matches and those tokens are
//! rejected on the next request, regardless of their own expiry. The most
//! recent login always wins.
//!
//! ## Token Classes
//!
//! Three mutually exclusive classes, discriminated by an explicit
//! `client_type` claim:
//!
//! - **interactive:** session-bound, expiring; used by the web panel.
//! - **temp_2fa:** short-lived marker binding a client to a username between
//!   login step 1 and step 2.
//! - **service:** non-expiring credential for automated callers; bypasses
//!   the session comparison and is killed only by disabling the account.
//!
//! ## Authorization
//!
//! Roles (`super_admin`, `admin`, `viewer`) map to static permission sets;
//! per-account overrides are honored. Protected operations consult
//! [`auth::AccessGuard`] and then [`auth::require_permission`].

pub mod auth;
pub mod cli;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
