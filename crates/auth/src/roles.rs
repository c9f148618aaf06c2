use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::permissions::{Permission, PermissionSet};

/// Role code used for RBAC (`ADMIN`, `EDITOR`, ...).
///
/// Codes are normalized on construction (trimmed, upper-cased) so `"admin"`
/// and `"ADMIN"` name the same role. Empty codes are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleName(String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("role name must not be empty")]
pub struct InvalidRoleName;

impl RoleName {
    pub const ADMIN: &'static str = "ADMIN";
    pub const EDITOR: &'static str = "EDITOR";
    pub const VIEWER: &'static str = "VIEWER";

    pub fn new(name: impl AsRef<str>) -> Result<Self, InvalidRoleName> {
        let normalized = name.as_ref().trim().to_uppercase();
        if normalized.is_empty() {
            return Err(InvalidRoleName);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoleName {
    type Error = InvalidRoleName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleName> for String {
    fn from(value: RoleName) -> Self {
        value.0
    }
}

impl core::str::FromStr for RoleName {
    type Err = InvalidRoleName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Role definition as held by the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: RoleName,
    pub permissions: PermissionSet,
    /// Roles whose permissions this role also grants.
    #[serde(default)]
    pub inherits: Vec<RoleName>,
}

impl RoleDefinition {
    pub fn new(name: RoleName, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            name,
            permissions: permissions.into_iter().collect(),
            inherits: Vec::new(),
        }
    }

    pub fn inheriting(mut self, parent: RoleName) -> Self {
        self.inherits.push(parent);
        self
    }
}

/// Flattened role → permission mapping.
///
/// Built once from role definitions and never mutated afterwards; a reload
/// produces a new table with the next epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleTable {
    roles: HashMap<RoleName, PermissionSet>,
    epoch: u64,
}

impl RoleTable {
    /// Build a table, flattening inheritance into precomputed unions.
    ///
    /// Unknown parents contribute nothing and cycles terminate.
    pub fn build(definitions: &[RoleDefinition], epoch: u64) -> Self {
        let by_name: HashMap<&RoleName, &RoleDefinition> =
            definitions.iter().map(|d| (&d.name, d)).collect();

        let mut roles = HashMap::with_capacity(definitions.len());
        for def in definitions {
            let mut perms = PermissionSet::new();
            let mut visited: BTreeSet<&RoleName> = BTreeSet::new();
            let mut pending: Vec<&RoleName> = vec![&def.name];

            while let Some(name) = pending.pop() {
                if !visited.insert(name) {
                    continue;
                }
                if let Some(current) = by_name.get(name) {
                    perms.extend(current.permissions.iter().copied());
                    pending.extend(current.inherits.iter());
                }
            }

            roles
                .entry(def.name.clone())
                .or_insert_with(PermissionSet::new)
                .extend(perms);
        }

        Self { roles, epoch }
    }

    /// The DCIM access levels: `VIEWER` ⊂ `EDITOR` ⊂ `ADMIN`.
    ///
    /// `network.reset` is deliberately granted by none of them.
    pub fn builtin_definitions() -> Vec<RoleDefinition> {
        let viewer = role(RoleName::VIEWER);
        let editor = role(RoleName::EDITOR);
        let admin = role(RoleName::ADMIN);

        vec![
            RoleDefinition::new(
                viewer.clone(),
                Permission::ALL.into_iter().filter(Permission::is_view),
            ),
            RoleDefinition::new(
                editor.clone(),
                Permission::ALL.into_iter().filter(Permission::is_edit),
            )
            .inheriting(viewer),
            RoleDefinition::new(
                admin,
                Permission::ALL
                    .into_iter()
                    .filter(|p| p.is_delete() || *p == Permission::UserManage),
            )
            .inheriting(editor),
        ]
    }

    pub fn builtin() -> Self {
        Self::build(&Self::builtin_definitions(), 0)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn knows(&self, role: &RoleName) -> bool {
        self.roles.contains_key(role)
    }

    /// Union of the permissions of all given roles; unknown roles add nothing.
    pub fn permissions_for<'a>(&self, roles: impl IntoIterator<Item = &'a RoleName>) -> PermissionSet {
        let mut perms = PermissionSet::new();
        for role in roles {
            if let Some(granted) = self.roles.get(role) {
                perms.extend(granted.iter().copied());
            }
        }
        perms
    }

    /// Roles that grant `permission` (sorted).
    pub fn roles_granting(&self, permission: Permission) -> Vec<RoleName> {
        let mut names: Vec<RoleName> = self
            .roles
            .iter()
            .filter(|(_, perms)| perms.contains(&permission))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

fn role(name: &str) -> RoleName {
    RoleName(name.to_string())
}
