//! Admin provisioning: account creation and the one-time super-admin seed.

use anyhow::Result;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::account::{AdminAccount, NewAdmin};
use super::password::hash_password;
use super::permission::Role;
use super::store::{AdminStore, InsertOutcome};
use super::utils::generate_device_token;

/// Outcome of an admin-creation attempt.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(AdminAccount),
    /// Username already exists; caller decides how to surface it.
    Conflict,
}

/// Create a new admin account.
///
/// The password is hashed, permissions default to the role's set when none
/// are given, and a fresh device capability token is generated.
///
/// # Errors
/// Returns an error if hashing, token generation, or the store fails.
pub async fn create_admin(
    store: &dyn AdminStore,
    new_admin: NewAdmin,
    created_by: Option<&str>,
) -> Result<CreateOutcome> {
    let password_hash = hash_password(&new_admin.password)?;
    let permissions = if new_admin.permissions.is_empty() {
        new_admin.role.default_permissions().to_vec()
    } else {
        new_admin.permissions
    };
    let device_token = generate_device_token()?;

    let account = AdminAccount {
        username: new_admin.username,
        password_hash,
        role: new_admin.role,
        permissions,
        is_active: true,
        device_token: Some(device_token),
        expires_at: new_admin.expires_at,
        current_session_id: None,
        last_session_ip: None,
        last_session_device: None,
        push_tokens: Vec::new(),
        last_login: None,
        login_count: 0,
        created_by: created_by.map(str::to_string),
        created_at: OffsetDateTime::now_utc(),
    };

    match store.insert(account.clone()).await? {
        InsertOutcome::Created => {
            info!(username = %account.username, role = %account.role, "admin created");
            Ok(CreateOutcome::Created(account))
        }
        InsertOutcome::Conflict => Ok(CreateOutcome::Conflict),
    }
}

/// Seed a default super-admin when none exists yet.
///
/// Returns the created account, or `None` when a super-admin is already
/// present and nothing was done.
///
/// # Errors
/// Returns an error if the store or account creation fails.
pub async fn ensure_default_admin(
    store: &dyn AdminStore,
    username: &str,
    password: &str,
) -> Result<Option<AdminAccount>> {
    if store.count_role(Role::SuperAdmin).await? > 0 {
        return Ok(None);
    }

    let outcome = create_admin(
        store,
        NewAdmin {
            username: username.to_string(),
            password: password.to_string(),
            role: Role::SuperAdmin,
            permissions: Vec::new(),
            expires_at: None,
        },
        Some("system"),
    )
    .await?;

    match outcome {
        CreateOutcome::Created(account) => {
            warn!(
                username = %account.username,
                "default super admin seeded; rotate the initial password"
            );
            Ok(Some(account))
        }
        // Raced another bootstrap; the other writer's account stands.
        CreateOutcome::Conflict => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::MemoryAdminStore;
    use crate::auth::password::verify_password;
    use crate::auth::permission::Permission;

    #[tokio::test]
    async fn create_admin_derives_role_permissions() -> Result<()> {
        let store = MemoryAdminStore::new();
        let outcome = create_admin(
            &store,
            NewAdmin {
                username: "carol".to_string(),
                password: "hunter2hunter2".to_string(),
                role: Role::Viewer,
                permissions: Vec::new(),
                expires_at: None,
            },
            Some("admin"),
        )
        .await?;

        let CreateOutcome::Created(account) = outcome else {
            panic!("expected creation");
        };
        assert_eq!(account.permissions, Role::Viewer.default_permissions());
        assert!(account.device_token.is_some());
        assert!(verify_password("hunter2hunter2", &account.password_hash));
        Ok(())
    }

    #[tokio::test]
    async fn explicit_permissions_override_role_defaults() -> Result<()> {
        let store = MemoryAdminStore::new();
        let outcome = create_admin(
            &store,
            NewAdmin {
                username: "dave".to_string(),
                password: "hunter2hunter2".to_string(),
                role: Role::Viewer,
                permissions: vec![Permission::ViewDevices, Permission::DeleteData],
                expires_at: None,
            },
            None,
        )
        .await?;

        let CreateOutcome::Created(account) = outcome else {
            panic!("expected creation");
        };
        assert_eq!(
            account.permissions,
            vec![Permission::ViewDevices, Permission::DeleteData]
        );
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() -> Result<()> {
        let store = MemoryAdminStore::new();
        let new_admin = NewAdmin {
            username: "erin".to_string(),
            password: "hunter2hunter2".to_string(),
            role: Role::Admin,
            permissions: Vec::new(),
            expires_at: None,
        };
        assert!(matches!(
            create_admin(&store, new_admin.clone(), None).await?,
            CreateOutcome::Created(_)
        ));
        assert!(matches!(
            create_admin(&store, new_admin, None).await?,
            CreateOutcome::Conflict
        ));
        Ok(())
    }

    #[tokio::test]
    async fn default_admin_seeded_only_once() -> Result<()> {
        let store = MemoryAdminStore::new();
        let first = ensure_default_admin(&store, "admin", "change-me-now").await?;
        assert!(first.is_some());
        assert_eq!(
            first.map(|account| account.role),
            Some(Role::SuperAdmin)
        );

        let second = ensure_default_admin(&store, "admin", "change-me-now").await?;
        assert!(second.is_none());
        Ok(())
    }
}
