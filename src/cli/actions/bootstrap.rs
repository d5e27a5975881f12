//! Provisioning action: run migrations and seed the default super admin.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::info;

use crate::auth::{ensure_default_admin, PgAdminStore};

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub admin_username: String,
    pub admin_password: SecretString,
}

/// Execute the bootstrap action.
///
/// Idempotent: migrations are versioned and the super admin is only created
/// when none exists.
///
/// # Errors
/// Returns an error if the database is unreachable, migrations fail, or the
/// seed insert fails.
pub async fn execute(args: Args) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let store = PgAdminStore::new(pool);
    match ensure_default_admin(
        &store,
        &args.admin_username,
        args.admin_password.expose_secret(),
    )
    .await?
    {
        Some(account) => info!(username = %account.username, "default super admin ready"),
        None => info!("super admin already present; nothing to seed"),
    }

    Ok(())
}
