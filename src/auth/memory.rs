//! In-memory store backends.
//!
//! Used for isolated tests and for embedding the subsystem without a
//! database. Both stores keep their state behind an async mutex; the mutex
//! gives the same single-writer atomicity per record that the Postgres
//! backend gets from row-level updates.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::account::{AdminAccount, SessionUpdate};
use super::otp::OtpChallenge;
use super::permission::Role;
use super::store::{AdminStore, InsertOutcome, OtpStore};

/// Credential store backed by a process-local map.
#[derive(Default)]
pub struct MemoryAdminStore {
    accounts: Mutex<HashMap<String, AdminAccount>>,
}

impl MemoryAdminStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdminStore for MemoryAdminStore {
    async fn lookup(&self, username: &str) -> Result<Option<AdminAccount>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.get(username).cloned())
    }

    async fn insert(&self, account: AdminAccount) -> Result<InsertOutcome> {
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&account.username) {
            return Ok(InsertOutcome::Conflict);
        }
        accounts.insert(account.username.clone(), account);
        Ok(InsertOutcome::Created)
    }

    async fn count_role(&self, role: Role) -> Result<i64> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .values()
            .filter(|account| account.role == role)
            .count() as i64)
    }

    async fn record_login(&self, username: &str) -> Result<()> {
        let mut accounts = self.accounts.lock().await;
        if let Some(account) = accounts.get_mut(username) {
            account.last_login = Some(OffsetDateTime::now_utc());
            account.login_count += 1;
        }
        Ok(())
    }

    async fn assign_session(&self, username: &str, update: &SessionUpdate) -> Result<()> {
        let mut accounts = self.accounts.lock().await;
        if let Some(account) = accounts.get_mut(username) {
            account.current_session_id = Some(update.session_id.clone());
            account.last_session_ip = Some(update.ip.clone());
            account.last_session_device = Some(update.device.clone());
            if let Some(push_token) = &update.push_token {
                account.push_tokens = vec![push_token.clone()];
            }
        }
        Ok(())
    }

    async fn deactivate(&self, username: &str) -> Result<()> {
        let mut accounts = self.accounts.lock().await;
        if let Some(account) = accounts.get_mut(username) {
            account.is_active = false;
        }
        Ok(())
    }
}

/// Challenge store backed by a process-local list.
#[derive(Default)]
pub struct MemoryOtpStore {
    challenges: Mutex<Vec<OtpChallenge>>,
}

impl MemoryOtpStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn insert(&self, challenge: OtpChallenge) -> Result<()> {
        let mut challenges = self.challenges.lock().await;
        // Housekeeping: drop rows that are both redeemed and expired.
        let now = OffsetDateTime::now_utc();
        challenges.retain(|existing| existing.expires_at > now || !existing.used);
        challenges.push(challenge);
        Ok(())
    }

    async fn find(&self, username: &str, code: &str) -> Result<Option<OtpChallenge>> {
        let challenges = self.challenges.lock().await;
        Ok(challenges
            .iter()
            .rev()
            .find(|challenge| {
                challenge.username == username && challenge.code == code && !challenge.used
            })
            .cloned())
    }

    async fn mark_used(&self, id: Uuid) -> Result<bool> {
        let mut challenges = self.challenges.lock().await;
        for challenge in challenges.iter_mut() {
            if challenge.id == id && !challenge.used {
                challenge.used = true;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn increment_attempts(&self, username: &str, code: &str) -> Result<()> {
        let mut challenges = self.challenges.lock().await;
        // Exact code match first; otherwise charge the newest open challenge
        // so wrong guesses are still counted.
        if let Some(challenge) = challenges.iter_mut().rev().find(|challenge| {
            challenge.username == username && challenge.code == code && !challenge.used
        }) {
            challenge.attempts += 1;
            return Ok(());
        }
        if let Some(challenge) = challenges
            .iter_mut()
            .rev()
            .find(|challenge| challenge.username == username && !challenge.used)
        {
            challenge.attempts += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn challenge(username: &str, code: &str, expired: bool) -> OtpChallenge {
        let now = OffsetDateTime::now_utc();
        let expires_at = if expired {
            now - Duration::seconds(1)
        } else {
            now + Duration::minutes(5)
        };
        OtpChallenge {
            id: Uuid::new_v4(),
            username: username.to_string(),
            code: code.to_string(),
            created_at: now,
            expires_at,
            used: false,
            attempts: 0,
            source_ip: "127.0.0.1".to_string(),
        }
    }

    #[tokio::test]
    async fn mark_used_transitions_exactly_once() -> Result<()> {
        let store = MemoryOtpStore::new();
        let challenge = challenge("alice", "123456", false);
        let id = challenge.id;
        store.insert(challenge).await?;

        assert!(store.mark_used(id).await?);
        assert!(!store.mark_used(id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn find_returns_newest_matching_code() -> Result<()> {
        let store = MemoryOtpStore::new();
        store.insert(challenge("alice", "111111", false)).await?;
        store.insert(challenge("alice", "222222", false)).await?;

        let found = store.find("alice", "111111").await?;
        assert!(found.is_some());
        assert!(store.find("alice", "999999").await?.is_none());
        assert!(store.find("bob", "111111").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn wrong_code_charges_newest_open_challenge() -> Result<()> {
        let store = MemoryOtpStore::new();
        store.insert(challenge("alice", "111111", false)).await?;
        store.increment_attempts("alice", "999999").await?;

        let found = store
            .find("alice", "111111")
            .await?
            .expect("challenge present");
        assert_eq!(found.attempts, 1);
        Ok(())
    }

    #[tokio::test]
    async fn session_assignment_replaces_push_tokens() -> Result<()> {
        let store = MemoryAdminStore::new();
        let mut account = crate::auth::tests::support::account("alice", Role::Admin);
        account.push_tokens = vec!["old-device".to_string()];
        store.insert(account).await?;

        let update = SessionUpdate {
            session_id: "session-1".to_string(),
            ip: "10.0.0.1".to_string(),
            device: "Firefox".to_string(),
            push_token: Some("new-device".to_string()),
        };
        store.assign_session("alice", &update).await?;

        let stored = store.lookup("alice").await?.expect("account present");
        assert_eq!(stored.current_session_id.as_deref(), Some("session-1"));
        assert_eq!(stored.push_tokens, vec!["new-device".to_string()]);
        Ok(())
    }
}
