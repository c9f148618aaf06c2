use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use dcim_core::TargetRef;
use thiserror::Error;

use crate::{AuditEntry, AuditError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditStoreError {
    #[error("audit store unavailable: {0}")]
    Unavailable(String),
}

impl From<AuditStoreError> for AuditError {
    fn from(value: AuditStoreError) -> Self {
        AuditError::storage(value.to_string())
    }
}

/// Append-only sink for audit entries.
///
/// There is deliberately no update or delete operation.
#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditStoreError>;
}

#[async_trait::async_trait]
impl<S> AuditStore for Arc<S>
where
    S: AuditStore + ?Sized,
{
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditStoreError> {
        (**self).append(entry).await
    }
}

/// In-memory audit store.
///
/// Intended for tests/dev. `fail_appends(true)` makes every append fail.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
    failing: AtomicBool,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn fail_appends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All entries in append order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Entries for one target, in append order.
    pub fn for_target(&self, target: &TargetRef) -> Vec<AuditEntry> {
        self.entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|e| e.target() == target)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: &AuditEntry) -> Result<(), AuditStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuditStoreError::Unavailable("append rejected".to_string()));
        }

        let mut entries = self
            .entries
            .write()
            .map_err(|_| AuditStoreError::Unavailable("lock poisoned".to_string()))?;
        entries.push(entry.clone());
        Ok(())
    }
}
