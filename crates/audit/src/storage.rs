//! Storage collaborator boundary for audited mutations.

use std::collections::HashMap;
use std::sync::Arc;

use dcim_core::{DomainError, TargetRef};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{ActionKind, AuditDraft, AuditEntry, AuditError, AuditStore};

/// A requested change to one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub action: ActionKind,
    pub target: TargetRef,
    /// New state (create) or changed fields (update). Unused for delete.
    pub payload: Option<JsonValue>,
}

impl Mutation {
    pub fn create(target: TargetRef, payload: JsonValue) -> Self {
        Self {
            action: ActionKind::Create,
            target,
            payload: Some(payload),
        }
    }

    pub fn update(target: TargetRef, payload: JsonValue) -> Self {
        Self {
            action: ActionKind::Update,
            target,
            payload: Some(payload),
        }
    }

    pub fn delete(target: TargetRef) -> Self {
        Self {
            action: ActionKind::Delete,
            target,
            payload: None,
        }
    }
}

/// Entity state around an applied mutation, as observed by storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationOutcome {
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error(transparent)]
    Rejected(#[from] DomainError),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StorageError> for AuditError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Rejected(e) => AuditError::Mutation(e),
            StorageError::Unavailable(msg) => AuditError::Storage(msg),
        }
    }
}

#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Apply a mutation on its own.
    async fn execute(&self, mutation: &Mutation) -> Result<MutationOutcome, StorageError>;

    /// Whether [`execute_audited`](Self::execute_audited) is available.
    fn supports_transactions(&self) -> bool {
        false
    }

    /// Apply a mutation and append its audit entry to `audit` in one
    /// transaction.
    ///
    /// Either both are committed or neither is. `audit` is the same log that
    /// standalone records go to.
    async fn execute_audited(
        &self,
        mutation: &Mutation,
        draft: AuditDraft,
        audit: &dyn AuditStore,
    ) -> Result<AuditEntry, AuditError> {
        let _ = (mutation, draft, audit);
        Err(AuditError::storage("storage does not support transactions"))
    }
}

#[async_trait::async_trait]
impl<S> Storage for Arc<S>
where
    S: Storage + ?Sized,
{
    async fn execute(&self, mutation: &Mutation) -> Result<MutationOutcome, StorageError> {
        (**self).execute(mutation).await
    }

    fn supports_transactions(&self) -> bool {
        (**self).supports_transactions()
    }

    async fn execute_audited(
        &self,
        mutation: &Mutation,
        draft: AuditDraft,
        audit: &dyn AuditStore,
    ) -> Result<AuditEntry, AuditError> {
        (**self).execute_audited(mutation, draft, audit).await
    }
}

/// In-memory entity storage.
///
/// Intended for tests/dev. The record lock is held across the audit append in
/// `execute_audited`, so a rejected append leaves the records untouched.
/// `non_transactional()` builds an instance that reports no transaction
/// support.
#[derive(Debug)]
pub struct InMemoryStorage {
    records: Mutex<HashMap<TargetRef, JsonValue>>,
    transactional: bool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            transactional: true,
        }
    }

    pub fn non_transactional() -> Self {
        Self {
            transactional: false,
            ..Self::new()
        }
    }

    /// Insert a record directly, bypassing auditing.
    pub async fn seed(&self, target: TargetRef, value: JsonValue) {
        self.records.lock().await.insert(target, value);
    }

    pub async fn get(&self, target: &TargetRef) -> Option<JsonValue> {
        self.records.lock().await.get(target).cloned()
    }

    fn plan(records: &HashMap<TargetRef, JsonValue>, mutation: &Mutation) -> Result<MutationOutcome, DomainError> {
        let current = records.get(&mutation.target);

        match mutation.action {
            ActionKind::Create => {
                if current.is_some() {
                    return Err(DomainError::conflict(format!("{} already exists", mutation.target)));
                }
                let payload = mutation
                    .payload
                    .clone()
                    .ok_or_else(|| DomainError::validation("create requires a payload"))?;
                Ok(MutationOutcome {
                    before: None,
                    after: Some(payload),
                })
            }
            ActionKind::Update => {
                let current = current.ok_or_else(|| DomainError::not_found(mutation.target.to_string()))?;
                let payload = mutation
                    .payload
                    .as_ref()
                    .ok_or_else(|| DomainError::validation("update requires a payload"))?;
                Ok(MutationOutcome {
                    before: Some(current.clone()),
                    after: Some(merge(current, payload)),
                })
            }
            ActionKind::Delete => {
                let current = current.ok_or_else(|| DomainError::not_found(mutation.target.to_string()))?;
                Ok(MutationOutcome {
                    before: Some(current.clone()),
                    after: None,
                })
            }
        }
    }

    fn commit(records: &mut HashMap<TargetRef, JsonValue>, target: &TargetRef, outcome: &MutationOutcome) {
        match &outcome.after {
            Some(after) => {
                records.insert(target.clone(), after.clone());
            }
            None => {
                records.remove(target);
            }
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Shallow merge of object fields; any other payload replaces the record.
fn merge(current: &JsonValue, changes: &JsonValue) -> JsonValue {
    match (current, changes) {
        (JsonValue::Object(base), JsonValue::Object(patch)) => {
            let mut merged = base.clone();
            for (k, v) in patch {
                merged.insert(k.clone(), v.clone());
            }
            JsonValue::Object(merged)
        }
        _ => changes.clone(),
    }
}

#[async_trait::async_trait]
impl Storage for InMemoryStorage {
    async fn execute(&self, mutation: &Mutation) -> Result<MutationOutcome, StorageError> {
        let mut records = self.records.lock().await;
        let outcome = Self::plan(&records, mutation)?;
        Self::commit(&mut records, &mutation.target, &outcome);
        Ok(outcome)
    }

    fn supports_transactions(&self) -> bool {
        self.transactional
    }

    async fn execute_audited(
        &self,
        mutation: &Mutation,
        draft: AuditDraft,
        audit: &dyn AuditStore,
    ) -> Result<AuditEntry, AuditError> {
        if !self.transactional {
            return Err(AuditError::storage("storage does not support transactions"));
        }

        let mut records = self.records.lock().await;
        let outcome = Self::plan(&records, mutation)?;
        let entry = draft.complete(&outcome)?;
        if let Err(e) = audit.append(&entry).await {
            tracing::warn!(target = %mutation.target, error = %e, "audit append rejected; transaction rolled back");
            return Err(e.into());
        }

        Self::commit(&mut records, &mutation.target, &outcome);
        Ok(entry)
    }
}
