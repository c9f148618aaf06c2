//! Outstanding refresh tokens, kept by hash so they can be revoked.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{AuthError, PrincipalId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshStoreError {
    #[error("refresh token store unavailable: {0}")]
    Unavailable(String),
}

impl From<RefreshStoreError> for AuthError {
    fn from(value: RefreshStoreError) -> Self {
        AuthError::storage(value.to_string())
    }
}

/// Hex SHA-256 of a refresh token. Only this digest is ever stored.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Server-side record of refresh tokens that may still be exchanged.
///
/// A signed, unexpired refresh token is only honoured while its hash is held
/// here for the same principal.
#[async_trait::async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn save(
        &self,
        principal: PrincipalId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RefreshStoreError>;

    async fn contains(&self, principal: PrincipalId, token_hash: &str) -> Result<bool, RefreshStoreError>;

    /// Forget every token of `principal`. Returns how many were dropped.
    async fn revoke_all(&self, principal: PrincipalId) -> Result<usize, RefreshStoreError>;
}

#[async_trait::async_trait]
impl<S> RefreshTokenStore for Arc<S>
where
    S: RefreshTokenStore + ?Sized,
{
    async fn save(
        &self,
        principal: PrincipalId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RefreshStoreError> {
        (**self).save(principal, token_hash, expires_at).await
    }

    async fn contains(&self, principal: PrincipalId, token_hash: &str) -> Result<bool, RefreshStoreError> {
        (**self).contains(principal, token_hash).await
    }

    async fn revoke_all(&self, principal: PrincipalId) -> Result<usize, RefreshStoreError> {
        (**self).revoke_all(principal).await
    }
}

/// In-memory refresh token store.
///
/// Intended for tests/dev. Entries past their expiry are dropped whenever the
/// same principal saves a new token.
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: RwLock<HashMap<PrincipalId, HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of live hashes held for `principal`.
    pub fn count(&self, principal: PrincipalId) -> usize {
        let tokens = self.tokens.read().unwrap_or_else(|p| p.into_inner());
        tokens.get(&principal).map_or(0, HashMap::len)
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn save(
        &self,
        principal: PrincipalId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RefreshStoreError> {
        let now = Utc::now();
        let mut tokens = self.tokens.write().unwrap_or_else(|p| p.into_inner());
        let held = tokens.entry(principal).or_default();
        held.retain(|_, exp| *exp > now);
        held.insert(token_hash.to_string(), expires_at);
        Ok(())
    }

    async fn contains(&self, principal: PrincipalId, token_hash: &str) -> Result<bool, RefreshStoreError> {
        let tokens = self.tokens.read().unwrap_or_else(|p| p.into_inner());
        Ok(tokens
            .get(&principal)
            .is_some_and(|held| held.contains_key(token_hash)))
    }

    async fn revoke_all(&self, principal: PrincipalId) -> Result<usize, RefreshStoreError> {
        let mut tokens = self.tokens.write().unwrap_or_else(|p| p.into_inner());
        Ok(tokens.remove(&principal).map_or(0, |held| held.len()))
    }
}
