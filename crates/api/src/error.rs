use dcim_audit::AuditError;
use dcim_auth::AuthError;
use dcim_core::EntityKind;
use serde_json::json;
use thiserror::Error;

/// Failure surfaced to the router.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    /// No permission guards changes to this kind of entity.
    #[error("changes to '{0}' are not handled by this service")]
    UnsupportedTarget(EntityKind),
}

impl ServiceError {
    /// HTTP status the router should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Auth(e) => match e {
                AuthError::InvalidCredentials
                | AuthError::InvalidSignature
                | AuthError::MalformedToken(_)
                | AuthError::Unauthenticated => 401,
                AuthError::AccountDisabled | AuthError::Forbidden(_) => 403,
                // Expired session.
                AuthError::TokenExpired => 419,
                AuthError::TokenIssue(_) | AuthError::Storage(_) => 500,
            },
            ServiceError::Audit(e) => match e {
                AuditError::Mutation(dcim_core::DomainError::NotFound(_)) => 404,
                AuditError::Mutation(dcim_core::DomainError::Conflict(_)) => 409,
                AuditError::Mutation(_) => 400,
                AuditError::InvalidSnapshot(_) | AuditError::Storage(_) | AuditError::AuditWriteFailed { .. } => 500,
            },
            ServiceError::UnsupportedTarget(_) => 400,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Auth(e) => match e {
                AuthError::InvalidCredentials => "invalid_credentials",
                AuthError::AccountDisabled => "account_disabled",
                AuthError::InvalidSignature => "invalid_signature",
                AuthError::TokenExpired => "token_expired",
                AuthError::MalformedToken(_) => "malformed_token",
                AuthError::Unauthenticated => "unauthenticated",
                AuthError::Forbidden(_) => "forbidden",
                AuthError::TokenIssue(_) => "token_issue_failed",
                AuthError::Storage(_) => "identity_store_error",
            },
            ServiceError::Audit(e) => match e {
                AuditError::Mutation(_) => "mutation_rejected",
                AuditError::InvalidSnapshot(_) => "invalid_snapshot",
                AuditError::Storage(_) => "audit_store_error",
                AuditError::AuditWriteFailed { .. } => "audit_write_failed",
            },
            ServiceError::UnsupportedTarget(_) => "unsupported_target",
        }
    }

    /// JSON body `{"error": code, "message": ...}`.
    ///
    /// Server-side failures get a generic message; details stay in the logs.
    pub fn body(&self) -> serde_json::Value {
        let message = if self.status_code() >= 500 {
            "internal error".to_string()
        } else {
            self.to_string()
        };
        json!({
            "error": self.code(),
            "message": message,
        })
    }
}
