//! Postgres store backends.
//!
//! Session assignment and OTP counter updates are single-statement row
//! updates; the database's row-level atomicity is the only synchronization
//! the subsystem relies on, and two concurrent logins racing on
//! `current_session_id` resolve to last-writer-wins.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::account::{AdminAccount, SessionUpdate};
use super::activity::{ActivityEvent, ActivitySink};
use super::otp::OtpChallenge;
use super::permission::{Permission, Role};
use super::store::{AdminStore, InsertOutcome, OtpStore};

/// Credential store over the `admins` table.
#[derive(Clone)]
pub struct PgAdminStore {
    pool: PgPool,
}

impl PgAdminStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn admin_from_row(row: &PgRow) -> Result<AdminAccount> {
    let role_text: String = row.get("role");
    let role = Role::parse(&role_text)
        .ok_or_else(|| anyhow!("unknown role in admins row: {role_text}"))?;

    let permission_texts: Vec<String> = row.get("permissions");
    let mut permissions = Vec::with_capacity(permission_texts.len());
    for text in &permission_texts {
        permissions.push(
            Permission::parse(text)
                .ok_or_else(|| anyhow!("unknown permission in admins row: {text}"))?,
        );
    }

    Ok(AdminAccount {
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        role,
        permissions,
        is_active: row.get("is_active"),
        device_token: row.get("device_token"),
        expires_at: row.get("expires_at"),
        current_session_id: row.get("current_session_id"),
        last_session_ip: row.get("last_session_ip"),
        last_session_device: row.get("last_session_device"),
        push_tokens: row.get("push_tokens"),
        last_login: row.get("last_login"),
        login_count: row.get("login_count"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl AdminStore for PgAdminStore {
    async fn lookup(&self, username: &str) -> Result<Option<AdminAccount>> {
        let query = r"
            SELECT username, password_hash, role, permissions, is_active,
                   device_token, expires_at, current_session_id,
                   last_session_ip, last_session_device, push_tokens,
                   last_login, login_count, created_by, created_at
            FROM admins
            WHERE username = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup admin")?;

        row.as_ref().map(admin_from_row).transpose()
    }

    async fn insert(&self, account: AdminAccount) -> Result<InsertOutcome> {
        let permissions: Vec<String> = account
            .permissions
            .iter()
            .map(|permission| permission.as_str().to_string())
            .collect();
        let query = r"
            INSERT INTO admins
                (username, password_hash, role, permissions, is_active,
                 device_token, expires_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(&account.username)
            .bind(&account.password_hash)
            .bind(account.role.as_str())
            .bind(&permissions)
            .bind(account.is_active)
            .bind(&account.device_token)
            .bind(account.expires_at)
            .bind(&account.created_by)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert admin"),
        }
    }

    async fn count_role(&self, role: Role) -> Result<i64> {
        let query = "SELECT COUNT(*) AS total FROM admins WHERE role = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to count admins by role")?;
        Ok(row.get("total"))
    }

    async fn record_login(&self, username: &str) -> Result<()> {
        let query = r"
            UPDATE admins
            SET last_login = NOW(),
                login_count = login_count + 1,
                updated_at = NOW()
            WHERE username = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(username)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record login")?;
        Ok(())
    }

    async fn assign_session(&self, username: &str, update: &SessionUpdate) -> Result<()> {
        // One statement so the session pointer, session metadata, and the
        // optional push-token replacement land atomically.
        let query = r"
            UPDATE admins
            SET current_session_id = $2,
                last_session_ip = $3,
                last_session_device = $4,
                push_tokens = CASE WHEN $5::text IS NULL THEN push_tokens ELSE ARRAY[$5] END,
                updated_at = NOW()
            WHERE username = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(username)
            .bind(&update.session_id)
            .bind(&update.ip)
            .bind(&update.device)
            .bind(update.push_token.as_deref())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to assign session")?;
        Ok(())
    }

    async fn deactivate(&self, username: &str) -> Result<()> {
        let query = r"
            UPDATE admins
            SET is_active = FALSE,
                updated_at = NOW()
            WHERE username = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(username)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to deactivate admin")?;
        Ok(())
    }
}

/// Challenge store over the `otp_challenges` table.
#[derive(Clone)]
pub struct PgOtpStore {
    pool: PgPool,
}

impl PgOtpStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn challenge_from_row(row: &PgRow) -> OtpChallenge {
    OtpChallenge {
        id: row.get("id"),
        username: row.get("username"),
        code: row.get("code"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        used: row.get("used"),
        attempts: row.get("attempts"),
        source_ip: row.get("source_ip"),
    }
}

#[async_trait]
impl OtpStore for PgOtpStore {
    async fn insert(&self, challenge: OtpChallenge) -> Result<()> {
        let mut tx = self.pool.begin().await.context("begin otp insert")?;

        // Reap rows that are both redeemed and expired to keep the table small.
        let query = "DELETE FROM otp_challenges WHERE used AND expires_at <= NOW()";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to reap otp challenges")?;

        let query = r"
            INSERT INTO otp_challenges
                (id, username, code, created_at, expires_at, used, attempts, source_ip)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(challenge.id)
            .bind(&challenge.username)
            .bind(&challenge.code)
            .bind(challenge.created_at)
            .bind(challenge.expires_at)
            .bind(challenge.used)
            .bind(challenge.attempts)
            .bind(&challenge.source_ip)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to insert otp challenge")?;

        tx.commit().await.context("commit otp insert")?;
        Ok(())
    }

    async fn find(&self, username: &str, code: &str) -> Result<Option<OtpChallenge>> {
        let query = r"
            SELECT id, username, code, created_at, expires_at, used, attempts, source_ip
            FROM otp_challenges
            WHERE username = $1 AND code = $2 AND NOT used
            ORDER BY created_at DESC
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .bind(code)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup otp challenge")?;
        Ok(row.as_ref().map(challenge_from_row))
    }

    async fn mark_used(&self, id: Uuid) -> Result<bool> {
        // Conditional update makes the false->true transition once-only even
        // under concurrent redemption of the same code.
        let query = r"
            UPDATE otp_challenges
            SET used = TRUE
            WHERE id = $1 AND NOT used
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to mark otp challenge used")?;
        Ok(row.is_some())
    }

    async fn increment_attempts(&self, username: &str, code: &str) -> Result<()> {
        let query = r"
            UPDATE otp_challenges
            SET attempts = attempts + 1
            WHERE id = (
                SELECT id FROM otp_challenges
                WHERE username = $1 AND code = $2 AND NOT used
                ORDER BY created_at DESC
                LIMIT 1
            )
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(username)
            .bind(code)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to increment otp attempts")?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Wrong guess with no matching record: charge the newest open
        // challenge for the username instead.
        let query = r"
            UPDATE otp_challenges
            SET attempts = attempts + 1
            WHERE id = (
                SELECT id FROM otp_challenges
                WHERE username = $1 AND NOT used
                ORDER BY created_at DESC
                LIMIT 1
            )
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(username)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to increment otp attempts for username")?;
        Ok(())
    }
}

/// Activity sink over the `admin_activity` table.
#[derive(Clone)]
pub struct PgActivitySink {
    pool: PgPool,
}

impl PgActivitySink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivitySink for PgActivitySink {
    async fn record(&self, event: ActivityEvent) -> Result<()> {
        let metadata =
            serde_json::to_string(&event.metadata).context("failed to serialize metadata")?;
        let query = r"
            INSERT INTO admin_activity
                (username, kind, description, ip_address, user_agent,
                 success, error_message, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8::jsonb, $9)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&event.username)
            .bind(event.kind.as_str())
            .bind(&event.description)
            .bind(&event.ip)
            .bind(&event.user_agent)
            .bind(event.success)
            .bind(&event.error_message)
            .bind(metadata)
            .bind(event.timestamp)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record admin activity")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_detection_matches_sqlstate() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn insert_outcome_debug_names() {
        assert_eq!(format!("{:?}", InsertOutcome::Created), "Created");
        assert_eq!(format!("{:?}", InsertOutcome::Conflict), "Conflict");
    }
}
