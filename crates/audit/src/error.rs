use dcim_core::{DomainError, TargetRef};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// Before/after snapshots do not fit the action.
    #[error("invalid audit snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("audit storage error: {0}")]
    Storage(String),

    /// The mutation itself was rejected; nothing was applied or recorded.
    #[error("mutation rejected: {0}")]
    Mutation(#[from] DomainError),

    /// The mutation was applied but its audit entry could not be persisted.
    #[error("change to {target} was applied but the audit write failed: {reason}")]
    AuditWriteFailed { target: TargetRef, reason: String },
}

impl AuditError {
    pub fn invalid_snapshot(msg: impl Into<String>) -> Self {
        Self::InvalidSnapshot(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
