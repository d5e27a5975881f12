//! Command-line argument dispatch.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action.

use crate::cli::actions::{bootstrap, Action};
use crate::cli::commands::{ARG_ADMIN_PASSWORD, ARG_ADMIN_USERNAME, ARG_DSN};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let admin_username = matches
        .get_one::<String>(ARG_ADMIN_USERNAME)
        .cloned()
        .unwrap_or_else(|| "admin".to_string());
    let admin_password = matches
        .get_one::<String>(ARG_ADMIN_PASSWORD)
        .cloned()
        .context("missing required argument: --admin-password")?;

    Ok(Action::Bootstrap(bootstrap::Args {
        dsn,
        admin_username,
        admin_password: SecretString::from(admin_password),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn handler_builds_bootstrap_action() -> Result<()> {
        temp_env::with_vars(
            [
                ("GARDISTO_DSN", None::<&str>),
                ("GARDISTO_ADMIN_USERNAME", None),
                ("GARDISTO_ADMIN_PASSWORD", None),
            ],
            || {
                let matches = commands::new().get_matches_from(vec![
                    "gardisto",
                    "--dsn",
                    "postgres://user@localhost:5432/gardisto",
                    "--admin-password",
                    "change-me-now",
                ]);
                let action = handler(&matches)?;
                let Action::Bootstrap(args) = action;
                assert_eq!(args.dsn, "postgres://user@localhost:5432/gardisto");
                assert_eq!(args.admin_username, "admin");
                Ok(())
            },
        )
    }
}
