//! Credential verification against Argon2id password hashes.

use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use thiserror::Error;

use crate::store::IdentityStore;
use crate::{AuthError, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("invalid argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("hashing failed: {0}")]
    Hashing(String),
}

/// Argon2id hasher for login secrets.
///
/// Produces PHC strings (`$argon2id$v=19$...`); verification reads the
/// parameters back from the stored hash and compares in constant time.
#[derive(Debug, Clone)]
pub struct SecretHasher {
    params: Params,
}

impl SecretHasher {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Explicit cost parameters (memory in KiB, iterations, lanes).
    pub fn with_cost(memory_kib: u32, iterations: u32, lanes: u32) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, lanes, None)
            .map_err(|e| HashError::InvalidParams(e.to_string()))?;
        Ok(Self::new(params))
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a secret with a fresh random salt.
    pub fn hash(&self, secret: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut rand::rngs::OsRng);
        self.argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| HashError::Hashing(e.to_string()))
    }

    /// Whether `secret` matches `stored`.
    ///
    /// A stored value that is not a PHC string is a data problem, not a
    /// mismatch.
    pub fn matches(&self, secret: &str, stored: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(stored)
            .map_err(|e| AuthError::storage(format!("stored credential hash is malformed: {e}")))?;
        Ok(self.argon2().verify_password(secret.as_bytes(), &parsed).is_ok())
    }
}

impl Default for SecretHasher {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

/// Checks a presented identifier/secret pair against the identity store.
pub struct CredentialVerifier {
    store: Arc<dyn IdentityStore>,
    hasher: SecretHasher,
    /// Verified against when the identifier is unknown, so both failure
    /// paths do the same work.
    dummy_hash: String,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn IdentityStore>, hasher: SecretHasher) -> Result<Self, HashError> {
        let dummy_hash = hasher.hash("dcim-credential-verifier-placeholder")?;
        Ok(Self {
            store,
            hasher,
            dummy_hash,
        })
    }

    /// Verify credentials and return the principal.
    ///
    /// Unknown identifier and wrong secret both yield `InvalidCredentials`.
    /// A disabled account is only reported once the secret has matched.
    pub async fn verify(&self, identifier: &str, secret: &str) -> Result<Principal, AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            self.hasher.matches(secret, &self.dummy_hash)?;
            return Err(AuthError::InvalidCredentials);
        }

        let Some(record) = self.store.find_principal_by_identifier(identifier).await? else {
            self.hasher.matches(secret, &self.dummy_hash)?;
            tracing::warn!(identifier, "login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.matches(secret, &record.secret_hash)? {
            tracing::warn!(identifier, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        if !record.principal.is_active() {
            tracing::warn!(identifier, principal_id = %record.principal.id, "login for disabled account");
            return Err(AuthError::AccountDisabled);
        }

        tracing::debug!(principal_id = %record.principal.id, "credentials verified");
        Ok(record.principal)
    }
}

impl core::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}
