//! Role resolution: principal → roles (live) and roles → permissions (table).

use std::collections::BTreeSet;
use std::sync::Arc;

use dcim_core::Shared;

use crate::store::IdentityStore;
use crate::{AuthError, PermissionSet, PrincipalId, RoleName, RoleTable};

pub struct RoleResolver {
    store: Arc<dyn IdentityStore>,
    table: Shared<RoleTable>,
}

impl RoleResolver {
    /// Start with an already-built table (e.g. [`RoleTable::builtin`]).
    pub fn new(store: Arc<dyn IdentityStore>, table: RoleTable) -> Self {
        Self {
            store,
            table: Shared::new(table),
        }
    }

    /// Build the initial table from the identity store.
    pub async fn load(store: Arc<dyn IdentityStore>) -> Result<Self, AuthError> {
        let definitions = store.find_role_definitions().await?;
        let table = RoleTable::build(&definitions, 1);
        tracing::info!(roles = definitions.len(), "role table loaded");
        Ok(Self::new(store, table))
    }

    /// Currently assigned roles, read from the identity store at call time.
    ///
    /// This is independent of the role snapshot inside any issued token. A
    /// principal that is missing or disabled is unauthenticated.
    pub async fn resolve_roles(&self, principal_id: PrincipalId) -> Result<BTreeSet<RoleName>, AuthError> {
        let principal = self
            .store
            .find_principal_by_id(principal_id)
            .await?
            .ok_or(AuthError::Unauthenticated)?;
        if !principal.is_active() {
            tracing::warn!(principal_id = %principal.id, "live role check for disabled account");
            return Err(AuthError::Unauthenticated);
        }
        Ok(principal.roles().into_iter().collect())
    }

    /// Union of the permissions granted by `roles` under the current table.
    pub fn permissions_for<'a>(&self, roles: impl IntoIterator<Item = &'a RoleName>) -> PermissionSet {
        self.table.load().permissions_for(roles)
    }

    /// Current table snapshot.
    pub fn table(&self) -> Arc<RoleTable> {
        self.table.load()
    }

    /// Re-read role definitions and swap in a new table (next epoch).
    pub async fn reload(&self) -> Result<u64, AuthError> {
        let definitions = self.store.find_role_definitions().await?;
        let next = self
            .table
            .update(|current| RoleTable::build(&definitions, current.epoch() + 1));
        let epoch = next.epoch();
        tracing::info!(epoch, roles = definitions.len(), "role table reloaded");
        Ok(epoch)
    }

    /// Swap in a prepared table.
    pub fn install(&self, table: RoleTable) {
        let epoch = table.epoch();
        self.table.swap(table);
        tracing::info!(epoch, "role table installed");
    }
}

impl core::fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoleResolver")
            .field("epoch", &self.table.load().epoch())
            .finish_non_exhaustive()
    }
}
