//! Roles and the static role-to-permission mapping.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Admin role, ordered from most to least privileged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Viewer,
}

impl Role {
    /// Default permission set for the role. Accounts may override this at
    /// creation; the mapping itself is fixed.
    #[must_use]
    pub fn default_permissions(self) -> &'static [Permission] {
        match self {
            Self::SuperAdmin => &[
                Permission::ViewDevices,
                Permission::ManageDevices,
                Permission::SendCommands,
                Permission::ViewSms,
                Permission::ViewContacts,
                Permission::DeleteData,
                Permission::ManageAdmins,
                Permission::ViewAdminLogs,
                Permission::ChangeSettings,
            ],
            Self::Admin => &[
                Permission::ViewDevices,
                Permission::ManageDevices,
                Permission::SendCommands,
                Permission::ViewSms,
                Permission::ViewContacts,
                Permission::ChangeSettings,
            ],
            Self::Viewer => &[
                Permission::ViewDevices,
                Permission::ViewSms,
                Permission::ViewContacts,
            ],
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Viewer => "viewer",
        }
    }

    /// Parse the stored wire form back into a role.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "super_admin" => Some(Self::SuperAdmin),
            "admin" => Some(Self::Admin),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual capability checked by protected operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewDevices,
    ManageDevices,
    SendCommands,
    ViewSms,
    ViewContacts,
    DeleteData,
    ManageAdmins,
    ViewAdminLogs,
    ChangeSettings,
}

impl Permission {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewDevices => "view_devices",
            Self::ManageDevices => "manage_devices",
            Self::SendCommands => "send_commands",
            Self::ViewSms => "view_sms",
            Self::ViewContacts => "view_contacts",
            Self::DeleteData => "delete_data",
            Self::ManageAdmins => "manage_admins",
            Self::ViewAdminLogs => "view_admin_logs",
            Self::ChangeSettings => "change_settings",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "view_devices" => Some(Self::ViewDevices),
            "manage_devices" => Some(Self::ManageDevices),
            "send_commands" => Some(Self::SendCommands),
            "view_sms" => Some(Self::ViewSms),
            "view_contacts" => Some(Self::ViewContacts),
            "delete_data" => Some(Self::DeleteData),
            "manage_admins" => Some(Self::ManageAdmins),
            "view_admin_logs" => Some(Self::ViewAdminLogs),
            "change_settings" => Some(Self::ChangeSettings),
            _ => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
