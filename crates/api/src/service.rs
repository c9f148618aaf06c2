//! The facade a router calls: login, token checks, permission checks and
//! audited changes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dcim_audit::{ActionKind, AuditEntry, AuditRecorder, AuditStore, AuditedExecutor, Mutation, Storage};
use dcim_auth::{
    AccessEnforcer, AuthError, AuthorizationExplanation, Capabilities, Claims, CredentialVerifier, Decision,
    IdentityStore, Permission, PrincipalId, RefreshTokenStore, RoleName, RoleResolver, SecretHasher, Sensitivity,
    SigningKey, TokenIssuer, TokenType, extract_bearer, hash_refresh_token,
};
use dcim_core::TargetRef;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::{AccessConfig, ServiceError, authz};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResponse {
    pub principal_id: PrincipalId,
    pub username: String,
    pub roles: Vec<RoleName>,
    pub capabilities: Capabilities,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

pub struct AccessService {
    identity: Arc<dyn IdentityStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    verifier: CredentialVerifier,
    issuer: TokenIssuer,
    enforcer: AccessEnforcer,
    executor: AuditedExecutor,
}

impl AccessService {
    /// Wire the service from configuration and its collaborators.
    ///
    /// The role table is loaded from the identity store once, here.
    pub async fn build(
        config: &AccessConfig,
        hasher: SecretHasher,
        identity: Arc<dyn IdentityStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        storage: Arc<dyn Storage>,
        audit_store: Arc<dyn AuditStore>,
    ) -> Result<Self, ServiceError> {
        let verifier = CredentialVerifier::new(identity.clone(), hasher)
            .map_err(|e| AuthError::storage(e.to_string()))?;
        let issuer = TokenIssuer::new(config.signing_key(), config.token_ttls());
        let resolver = Arc::new(RoleResolver::load(identity.clone()).await?);
        let enforcer = AccessEnforcer::new(resolver, config.live_role_check);
        let executor = AuditedExecutor::new(storage, AuditRecorder::new(audit_store));

        tracing::info!(
            environment = ?config.environment,
            live_role_check = config.live_role_check,
            audit_mode = ?executor.mode(),
            "access service ready"
        );

        Ok(Self {
            identity,
            refresh_tokens,
            verifier,
            issuer,
            enforcer,
            executor,
        })
    }

    pub async fn login(&self, identifier: &str, secret: &str) -> Result<LoginResponse, ServiceError> {
        self.login_at(identifier, secret, Utc::now()).await
    }

    pub async fn login_at(
        &self,
        identifier: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginResponse, ServiceError> {
        let principal = self.verifier.verify(identifier, secret).await?;

        let refresh_claims = self.issuer.claims_for(&principal, TokenType::Refresh, now)?;
        let tokens = TokenPair {
            access_token: self.issuer.issue(&principal, TokenType::Access, now)?,
            refresh_token: self.issuer.encode(&refresh_claims)?,
        };
        self.refresh_tokens
            .save(principal.id, &hash_refresh_token(&tokens.refresh_token), refresh_claims.expires_at)
            .await
            .map_err(AuthError::from)?;
        let roles = principal.roles();
        let capabilities = Capabilities::from_permissions(&self.enforcer.resolver().permissions_for(roles.iter()));

        tracing::info!(principal_id = %principal.id, roles = roles.len(), "login succeeded");
        Ok(LoginResponse {
            principal_id: principal.id,
            username: principal.username,
            roles,
            capabilities,
            tokens,
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The refresh token must still be held for its subject (not revoked by
    /// [`logout`](Self::logout)). The principal is re-read, so the new access
    /// token carries current roles and a disabled account can no longer
    /// refresh. The refresh token itself is returned unchanged.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        self.refresh_at(refresh_token, Utc::now()).await
    }

    pub async fn refresh_at(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<TokenPair, ServiceError> {
        let claims = self.issuer.decode_expecting(refresh_token, TokenType::Refresh, now)?;

        let known = self
            .refresh_tokens
            .contains(claims.sub, &hash_refresh_token(refresh_token))
            .await
            .map_err(AuthError::from)?;
        if !known {
            tracing::warn!(principal_id = %claims.sub, "refresh with unknown or revoked token");
            return Err(AuthError::Unauthenticated.into());
        }

        let principal = self
            .identity
            .find_principal_by_id(claims.sub)
            .await
            .map_err(AuthError::from)?
            .ok_or(AuthError::Unauthenticated)?;
        if !principal.is_active() {
            tracing::warn!(principal_id = %principal.id, "refresh for disabled account");
            return Err(AuthError::Unauthenticated.into());
        }

        let access_token = self.issuer.issue(&principal, TokenType::Access, now)?;
        tracing::debug!(principal_id = %principal.id, "access token refreshed");
        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.to_string(),
        })
    }

    /// Revoke every refresh token of the caller. Access tokens already issued
    /// stay valid until they expire.
    pub async fn logout(&self, claims: &Claims) -> Result<(), ServiceError> {
        let revoked = self
            .refresh_tokens
            .revoke_all(claims.sub)
            .await
            .map_err(AuthError::from)?;
        tracing::info!(principal_id = %claims.sub, revoked, "logged out");
        Ok(())
    }

    /// Decode an access token into claims.
    pub fn authenticate_request(&self, token: &str) -> Result<Claims, ServiceError> {
        self.authenticate_request_at(token, Utc::now())
    }

    pub fn authenticate_request_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, ServiceError> {
        self.issuer
            .decode_expecting(token, TokenType::Access, now)
            .map_err(|e| {
                tracing::debug!(error = %e, "request not authenticated");
                ServiceError::from(e)
            })
    }

    /// Decode the access token from an `Authorization` header value.
    pub fn authenticate_header(&self, header: Option<&str>) -> Result<Claims, ServiceError> {
        let token = extract_bearer(header)?;
        self.authenticate_request(token)
    }

    /// Snapshot-based check; never touches storage.
    pub fn authorize(&self, claims: &Claims, permission: Permission) -> bool {
        self.enforcer.authorize(claims, permission).is_allowed()
    }

    /// Endpoint guard. Sensitive endpoints may re-resolve roles live.
    pub async fn authorize_endpoint(
        &self,
        claims: &Claims,
        permission: Permission,
        sensitivity: Sensitivity,
    ) -> Result<(), ServiceError> {
        match self.enforcer.authorize_endpoint(claims, permission, sensitivity).await? {
            Decision::Allowed => Ok(()),
            Decision::Denied => Err(AuthError::Forbidden(permission).into()),
        }
    }

    pub fn explain(&self, claims: &Claims, permission: Permission) -> AuthorizationExplanation {
        self.enforcer.explain(claims, permission)
    }

    /// Record a change applied elsewhere.
    pub async fn log_change(
        &self,
        claims: &Claims,
        action: ActionKind,
        target: TargetRef,
        before: Option<JsonValue>,
        after: Option<JsonValue>,
    ) -> Result<AuditEntry, ServiceError> {
        Ok(self
            .executor
            .recorder()
            .record(claims.sub, action, target, before, after, Utc::now())
            .await?)
    }

    /// Check `permission`, then apply `mutation` with its audit entry.
    pub async fn perform(
        &self,
        claims: &Claims,
        permission: Permission,
        mutation: &Mutation,
    ) -> Result<AuditEntry, ServiceError> {
        self.perform_at(claims, permission, mutation, Utc::now()).await
    }

    pub async fn perform_at(
        &self,
        claims: &Claims,
        permission: Permission,
        mutation: &Mutation,
        now: DateTime<Utc>,
    ) -> Result<AuditEntry, ServiceError> {
        self.enforcer.require(claims, permission)?;
        Ok(self.executor.apply(claims.sub, mutation, now).await?)
    }

    /// Like [`perform`](Self::perform), deriving the permission from the
    /// mutation's target kind and action.
    pub async fn perform_mutation(&self, claims: &Claims, mutation: &Mutation) -> Result<AuditEntry, ServiceError> {
        let permission =
            authz::permission_for(mutation).ok_or(ServiceError::UnsupportedTarget(mutation.target.kind))?;
        self.perform(claims, permission, mutation).await
    }

    /// Re-read role definitions. Returns the new epoch.
    pub async fn reload_roles(&self) -> Result<u64, ServiceError> {
        Ok(self.enforcer.resolver().reload().await?)
    }

    pub fn rotate_signing_key(&self, key: SigningKey) {
        self.issuer.rotate_key(key);
    }
}

impl core::fmt::Debug for AccessService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessService")
            .field("issuer", &self.issuer)
            .field("enforcer", &self.enforcer)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}
