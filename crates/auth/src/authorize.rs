use std::sync::Arc;

use serde::Serialize;

use crate::{AuthError, Claims, Permission, PermissionSet, PrincipalId, RoleName, RoleResolver};

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// How much an endpoint trusts the role snapshot in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sensitivity {
    /// The token's role snapshot is authoritative until expiry.
    #[default]
    Standard,
    /// Roles are re-read from the identity store when live checks are enabled.
    Sensitive,
}

/// Allows or denies operations for decoded claims.
///
/// - No IO on the default path (snapshot roles)
/// - No panics
/// - Deterministic for the same claims within one role-table epoch
#[derive(Debug)]
pub struct AccessEnforcer {
    resolver: Arc<RoleResolver>,
    live_role_check: bool,
}

impl AccessEnforcer {
    pub fn new(resolver: Arc<RoleResolver>, live_role_check: bool) -> Self {
        Self {
            resolver,
            live_role_check,
        }
    }

    pub fn resolver(&self) -> &Arc<RoleResolver> {
        &self.resolver
    }

    /// Check `required` against the token's role snapshot.
    pub fn authorize(&self, claims: &Claims, required: Permission) -> Decision {
        let perms = self.resolver.permissions_for(claims.roles.iter());
        decide(claims.sub, &perms, required)
    }

    /// Like [`authorize`](Self::authorize), as a `Forbidden` error.
    pub fn require(&self, claims: &Claims, required: Permission) -> Result<(), AuthError> {
        match self.authorize(claims, required) {
            Decision::Allowed => Ok(()),
            Decision::Denied => Err(AuthError::Forbidden(required)),
        }
    }

    /// Per-endpoint check: sensitive endpoints re-resolve roles live when the
    /// live-role policy is enabled; everything else uses the snapshot.
    pub async fn authorize_endpoint(
        &self,
        claims: &Claims,
        required: Permission,
        sensitivity: Sensitivity,
    ) -> Result<Decision, AuthError> {
        if !(self.live_role_check && sensitivity == Sensitivity::Sensitive) {
            return Ok(self.authorize(claims, required));
        }

        let roles = self.resolver.resolve_roles(claims.sub).await?;
        let perms = self.resolver.permissions_for(roles.iter());
        Ok(decide(claims.sub, &perms, required))
    }

    /// Explain why a decision was made (or would be made).
    pub fn explain(&self, claims: &Claims, required: Permission) -> AuthorizationExplanation {
        let table = self.resolver.table();
        let effective = table.permissions_for(claims.roles.iter());
        let granted = effective.contains(&required);
        let unknown_roles: Vec<String> = claims
            .roles
            .iter()
            .filter(|r| !table.knows(r))
            .map(|r| r.as_str().to_string())
            .collect();

        let reason = if granted {
            format!("principal has permission '{required}'")
        } else if claims.roles.is_empty() {
            format!("principal has no roles; '{required}' requires one of {:?}", role_strings(&table.roles_granting(required)))
        } else {
            format!(
                "none of the roles {:?} grants '{required}'; granted by {:?}",
                role_strings(&claims.roles),
                role_strings(&table.roles_granting(required))
            )
        };

        AuthorizationExplanation {
            required_permission: required,
            granted,
            reason,
            roles: role_strings(&claims.roles),
            unknown_roles,
            effective_permissions: effective.into_iter().collect(),
            epoch: table.epoch(),
        }
    }
}

fn decide(principal: PrincipalId, perms: &PermissionSet, required: Permission) -> Decision {
    let decision = if perms.contains(&required) {
        Decision::Allowed
    } else {
        Decision::Denied
    };
    tracing::debug!(principal_id = %principal, permission = %required, ?decision, "authorization decision");
    decision
}

fn role_strings(roles: &[RoleName]) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed, serializable account of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: Permission,
    pub granted: bool,
    /// Human-readable reason for the decision.
    pub reason: String,
    /// Role snapshot from the token.
    pub roles: Vec<String>,
    /// Roles in the token that the current table does not define.
    pub unknown_roles: Vec<String>,
    pub effective_permissions: Vec<Permission>,
    /// Role-table epoch the decision was made under.
    pub epoch: u64,
}
