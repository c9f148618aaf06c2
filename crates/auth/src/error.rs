use thiserror::Error;

use crate::Permission;

/// Authentication / authorization failure.
///
/// Every variant is a typed outcome the caller must map to an outward signal;
/// none of them is retried here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown identifier or wrong secret (deliberately indistinguishable).
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    TokenExpired,

    #[error("token is malformed: {0}")]
    MalformedToken(String),

    /// No valid claims for the request.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Valid claims, missing permission.
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),

    /// A token could not be produced. Internal, never the caller's fault.
    #[error("token could not be issued: {0}")]
    TokenIssue(String),

    /// Identity store failure.
    #[error("identity store error: {0}")]
    Storage(String),
}

impl AuthError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedToken(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
