use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthError, PrincipalId, RoleName};

/// Kind of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived, presented on every request.
    Access,
    /// Long-lived, exchanged for a new access token.
    Refresh,
}

impl core::fmt::Display for TokenType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

/// Decoded token contents.
///
/// The wire form is a flat object `{sub, roles, iat, exp, typ}` with integer
/// second timestamps. Missing or extra fields fail to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Claims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// Role snapshot taken at issuance; never refreshed for this token.
    pub roles: Vec<RoleName>,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,

    #[serde(rename = "typ")]
    pub token_type: TokenType,
}

/// Deterministically validate the claims' time window against `now`.
///
/// Signature verification happens before this, in the token issuer.
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), AuthError> {
    if claims.expires_at <= claims.issued_at {
        return Err(AuthError::malformed("expiry must be after issued-at"));
    }
    if now > claims.expires_at {
        return Err(AuthError::TokenExpired);
    }
    Ok(())
}
