use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Atomic capability required to perform an action.
///
/// The set is closed: every grantable capability is a variant here and checks
/// are exact matches. Wire names are dotted (`"device.create"`) and globally
/// unique, independent of any role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "device.view")]
    DeviceView,
    #[serde(rename = "device.create")]
    DeviceCreate,
    #[serde(rename = "device.update")]
    DeviceUpdate,
    #[serde(rename = "device.delete")]
    DeviceDelete,
    #[serde(rename = "rack.view")]
    RackView,
    #[serde(rename = "rack.create")]
    RackCreate,
    #[serde(rename = "rack.update")]
    RackUpdate,
    #[serde(rename = "rack.delete")]
    RackDelete,
    #[serde(rename = "location.view")]
    LocationView,
    #[serde(rename = "location.create")]
    LocationCreate,
    #[serde(rename = "location.update")]
    LocationUpdate,
    #[serde(rename = "location.delete")]
    LocationDelete,
    #[serde(rename = "changelog.view")]
    ChangeLogView,
    #[serde(rename = "user.manage")]
    UserManage,
    #[serde(rename = "network.reset")]
    NetworkReset,
}

/// Effective permissions of a principal (flattened union over its roles).
pub type PermissionSet = BTreeSet<Permission>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission '{0}'")]
pub struct UnknownPermission(pub String);

impl Permission {
    pub const ALL: [Permission; 15] = [
        Permission::DeviceView,
        Permission::DeviceCreate,
        Permission::DeviceUpdate,
        Permission::DeviceDelete,
        Permission::RackView,
        Permission::RackCreate,
        Permission::RackUpdate,
        Permission::RackDelete,
        Permission::LocationView,
        Permission::LocationCreate,
        Permission::LocationUpdate,
        Permission::LocationDelete,
        Permission::ChangeLogView,
        Permission::UserManage,
        Permission::NetworkReset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::DeviceView => "device.view",
            Permission::DeviceCreate => "device.create",
            Permission::DeviceUpdate => "device.update",
            Permission::DeviceDelete => "device.delete",
            Permission::RackView => "rack.view",
            Permission::RackCreate => "rack.create",
            Permission::RackUpdate => "rack.update",
            Permission::RackDelete => "rack.delete",
            Permission::LocationView => "location.view",
            Permission::LocationCreate => "location.create",
            Permission::LocationUpdate => "location.update",
            Permission::LocationDelete => "location.delete",
            Permission::ChangeLogView => "changelog.view",
            Permission::UserManage => "user.manage",
            Permission::NetworkReset => "network.reset",
        }
    }

    /// Read-only capability.
    pub fn is_view(&self) -> bool {
        match self {
            Permission::DeviceView | Permission::RackView | Permission::LocationView | Permission::ChangeLogView => true,
            Permission::DeviceCreate
            | Permission::DeviceUpdate
            | Permission::DeviceDelete
            | Permission::RackCreate
            | Permission::RackUpdate
            | Permission::RackDelete
            | Permission::LocationCreate
            | Permission::LocationUpdate
            | Permission::LocationDelete
            | Permission::UserManage
            | Permission::NetworkReset => false,
        }
    }

    /// Create or update capability.
    pub fn is_edit(&self) -> bool {
        match self {
            Permission::DeviceCreate
            | Permission::DeviceUpdate
            | Permission::RackCreate
            | Permission::RackUpdate
            | Permission::LocationCreate
            | Permission::LocationUpdate => true,
            Permission::DeviceView
            | Permission::DeviceDelete
            | Permission::RackView
            | Permission::RackDelete
            | Permission::LocationView
            | Permission::LocationDelete
            | Permission::ChangeLogView
            | Permission::UserManage
            | Permission::NetworkReset => false,
        }
    }

    pub fn is_delete(&self) -> bool {
        match self {
            Permission::DeviceDelete | Permission::RackDelete | Permission::LocationDelete => true,
            Permission::DeviceView
            | Permission::DeviceCreate
            | Permission::DeviceUpdate
            | Permission::RackView
            | Permission::RackCreate
            | Permission::RackUpdate
            | Permission::LocationView
            | Permission::LocationCreate
            | Permission::LocationUpdate
            | Permission::ChangeLogView
            | Permission::UserManage
            | Permission::NetworkReset => false,
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// Coarse UI capabilities derived from a permission set.
///
/// Returned on login so clients can decide which controls to show; the server
/// still enforces each permission individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

impl Capabilities {
    pub fn from_permissions(perms: &PermissionSet) -> Self {
        Self {
            can_view: perms.iter().any(Permission::is_view),
            can_edit: perms.iter().any(Permission::is_edit),
            can_delete: perms.iter().any(Permission::is_delete),
        }
    }
}
