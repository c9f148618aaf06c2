//! Token issuance and decoding (HS256 compact JWS).
//!
//! Decoding runs three checks in a fixed order: signature, then expiry, then
//! the strict structural parse. Nothing in the payload is trusted before the
//! signature has been verified.

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

use dcim_core::Shared;

use crate::claims::validate_claims;
use crate::{AuthError, Claims, Principal, TokenType};

/// Process-wide HMAC signing key.
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl core::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Lifetimes of the two token types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtls {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenTtls {
    pub fn for_type(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access,
            TokenType::Refresh => self.refresh,
        }
    }
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            access: Duration::seconds(900),
            refresh: Duration::days(7),
        }
    }
}

/// Signs and verifies tokens.
#[derive(Debug)]
pub struct TokenIssuer {
    key: Shared<SigningKey>,
    ttls: TokenTtls,
}

impl TokenIssuer {
    pub fn new(key: SigningKey, ttls: TokenTtls) -> Self {
        Self {
            key: Shared::new(key),
            ttls,
        }
    }

    pub fn ttls(&self) -> TokenTtls {
        self.ttls
    }

    /// Replace the signing key. Tokens signed with the old key stop verifying.
    pub fn rotate_key(&self, key: SigningKey) {
        self.key.swap(key);
        tracing::info!("token signing key rotated");
    }

    /// Issue a token for `principal` with its currently assigned roles.
    pub fn issue(
        &self,
        principal: &Principal,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = self.claims_for(principal, token_type, now)?;
        self.encode(&claims)
    }

    /// The claims [`issue`](Self::issue) would sign, for callers that also
    /// need the expiry.
    pub fn claims_for(
        &self,
        principal: &Principal,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        let issued_at = now.trunc_subsecs(0);
        let expires_at = issued_at
            .checked_add_signed(self.ttls.for_type(token_type))
            .ok_or_else(|| AuthError::TokenIssue(format!("{token_type} token expiry out of range")))?;
        Ok(Claims {
            sub: principal.id,
            roles: principal.roles(),
            issued_at,
            expires_at,
            token_type,
        })
    }

    /// Sign arbitrary claims.
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        let key: Arc<SigningKey> = self.key.load();
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &key.encoding)
            .map_err(|e| {
                tracing::error!(error = %e, "token encoding failed");
                AuthError::TokenIssue(e.to_string())
            })
    }

    /// Verify and decode a token of any type.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        // 1. signature
        let payload = self.verified_payload(token)?;

        // 2. expiry, read from the now-trusted payload
        let exp = payload
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| AuthError::malformed("missing or invalid 'exp'"))?;
        if now > exp {
            return Err(AuthError::TokenExpired);
        }

        // 3. structure
        let claims: Claims = serde_json::from_value(Value::Object(payload))
            .map_err(|e| AuthError::malformed(e.to_string()))?;
        validate_claims(&claims, now)?;
        Ok(claims)
    }

    /// Decode and require a specific token type.
    ///
    /// A valid token of the other type does not authenticate the caller.
    pub fn decode_expecting(
        &self,
        token: &str,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        let claims = self.decode(token, now)?;
        if claims.token_type != token_type {
            tracing::debug!(expected = %token_type, got = %claims.token_type, "token type mismatch");
            return Err(AuthError::Unauthenticated);
        }
        Ok(claims)
    }

    fn verified_payload(&self, token: &str) -> Result<Map<String, Value>, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time and structure are checked by `decode` afterwards, in order.
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;

        let key = self.key.load();
        jsonwebtoken::decode::<Map<String, Value>>(token, &key.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
                _ => AuthError::malformed(e.to_string()),
            })
    }
}
