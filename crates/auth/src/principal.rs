use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::RoleName;

/// Identity of an authenticated principal (human user, service account, etc).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<PrincipalId> for Uuid {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Account can authenticate.
    #[default]
    Active,
    /// Account exists but may not authenticate or refresh.
    Disabled,
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// A role assignment as stored by the identity subsystem.
///
/// Inactive assignments are kept for history but grant nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: RoleName,
    pub active: bool,
}

impl RoleAssignment {
    pub fn active(role: RoleName) -> Self {
        Self { role, active: true }
    }

    pub fn inactive(role: RoleName) -> Self {
        Self { role, active: false }
    }
}

/// An identity known to the system.
///
/// Provisioned and owned by the identity subsystem; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    /// Unique login identifier.
    pub username: String,
    pub assignments: Vec<RoleAssignment>,
    pub status: AccountStatus,
}

impl Principal {
    pub fn new(id: PrincipalId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            assignments: Vec::new(),
            status: AccountStatus::Active,
        }
    }

    pub fn with_role(mut self, role: RoleName) -> Self {
        self.assignments.push(RoleAssignment::active(role));
        self
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Currently assigned roles: active assignments only, deduplicated, in
    /// assignment order.
    pub fn roles(&self) -> Vec<RoleName> {
        let mut roles: Vec<RoleName> = Vec::with_capacity(self.assignments.len());
        for assignment in self.assignments.iter().filter(|a| a.active) {
            if !roles.contains(&assignment.role) {
                roles.push(assignment.role.clone());
            }
        }
        roles
    }
}

/// Stored credential: the principal plus its Argon2 PHC password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub principal: Principal,
    pub secret_hash: String,
}
