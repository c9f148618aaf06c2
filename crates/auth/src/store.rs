//! Identity store boundary (principals, credentials, role definitions).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::{AuthError, CredentialRecord, Principal, PrincipalId, RoleDefinition, RoleTable};

/// Identity store operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityStoreError {
    #[error("identity store unavailable: {0}")]
    Unavailable(String),

    #[error("identity store returned invalid data: {0}")]
    InvalidData(String),
}

impl From<IdentityStoreError> for AuthError {
    fn from(value: IdentityStoreError) -> Self {
        AuthError::storage(value.to_string())
    }
}

/// Read-only access to the identity subsystem.
///
/// Principals and role definitions are provisioned elsewhere; this core only
/// reads them. All calls may suspend (they cross into external storage).
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up the credential record for a login identifier (username).
    async fn find_principal_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CredentialRecord>, IdentityStoreError>;

    /// Look up a principal by id (current roles and status).
    async fn find_principal_by_id(
        &self,
        id: PrincipalId,
    ) -> Result<Option<Principal>, IdentityStoreError>;

    /// All role definitions.
    async fn find_role_definitions(&self) -> Result<Vec<RoleDefinition>, IdentityStoreError>;
}

#[async_trait::async_trait]
impl<S> IdentityStore for Arc<S>
where
    S: IdentityStore + ?Sized,
{
    async fn find_principal_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CredentialRecord>, IdentityStoreError> {
        (**self).find_principal_by_identifier(identifier).await
    }

    async fn find_principal_by_id(
        &self,
        id: PrincipalId,
    ) -> Result<Option<Principal>, IdentityStoreError> {
        (**self).find_principal_by_id(id).await
    }

    async fn find_role_definitions(&self) -> Result<Vec<RoleDefinition>, IdentityStoreError> {
        (**self).find_role_definitions().await
    }
}

/// In-memory identity store.
///
/// Intended for tests/dev. Seeded with the built-in role definitions.
#[derive(Debug)]
pub struct InMemoryIdentityStore {
    credentials: RwLock<HashMap<String, CredentialRecord>>,
    roles: RwLock<Vec<RoleDefinition>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self {
            credentials: RwLock::new(HashMap::new()),
            roles: RwLock::new(RoleTable::builtin_definitions()),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Provision (or replace) a principal with its password hash.
    pub fn insert(&self, principal: Principal, secret_hash: impl Into<String>) {
        let mut credentials = self.credentials.write().unwrap_or_else(|p| p.into_inner());
        credentials.insert(
            principal.username.clone(),
            CredentialRecord {
                principal,
                secret_hash: secret_hash.into(),
            },
        );
    }

    /// Apply `change` to the principal with `id`. Returns false if unknown.
    pub fn update_principal(&self, id: PrincipalId, change: impl FnOnce(&mut Principal)) -> bool {
        let mut credentials = self.credentials.write().unwrap_or_else(|p| p.into_inner());
        match credentials.values_mut().find(|r| r.principal.id == id) {
            Some(record) => {
                change(&mut record.principal);
                true
            }
            None => false,
        }
    }

    pub fn set_role_definitions(&self, definitions: Vec<RoleDefinition>) {
        *self.roles.write().unwrap_or_else(|p| p.into_inner()) = definitions;
    }
}

impl Default for InMemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_principal_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<CredentialRecord>, IdentityStoreError> {
        let credentials = self
            .credentials
            .read()
            .map_err(|_| IdentityStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(credentials.get(identifier).cloned())
    }

    async fn find_principal_by_id(
        &self,
        id: PrincipalId,
    ) -> Result<Option<Principal>, IdentityStoreError> {
        let credentials = self
            .credentials
            .read()
            .map_err(|_| IdentityStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(credentials
            .values()
            .find(|r| r.principal.id == id)
            .map(|r| r.principal.clone()))
    }

    async fn find_role_definitions(&self) -> Result<Vec<RoleDefinition>, IdentityStoreError> {
        let roles = self
            .roles
            .read()
            .map_err(|_| IdentityStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(roles.clone())
    }
}
