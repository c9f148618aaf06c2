use std::sync::Arc;

use chrono::{DateTime, Utc};
use dcim_auth::PrincipalId;

use crate::{AuditDraft, AuditEntry, AuditError, AuditRecorder, Mutation, Storage};

/// How a mutation and its audit entry are made durable together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyMode {
    /// Mutation and entry commit in one storage transaction. The entry is
    /// appended to the recorder's store from inside that transaction.
    Transactional,
    /// Mutation first, then the entry through the recorder. A failed audit
    /// write leaves the mutation applied and fails the call.
    Sequential,
}

/// Applies mutations so that each successful one leaves exactly one entry.
pub struct AuditedExecutor {
    storage: Arc<dyn Storage>,
    recorder: AuditRecorder,
    mode: ConsistencyMode,
}

impl AuditedExecutor {
    /// Transactional when the storage supports it, sequential otherwise.
    pub fn new(storage: Arc<dyn Storage>, recorder: AuditRecorder) -> Self {
        let mode = if storage.supports_transactions() {
            ConsistencyMode::Transactional
        } else {
            tracing::warn!("storage has no transaction support; audit writes are sequential");
            ConsistencyMode::Sequential
        };
        Self {
            storage,
            recorder,
            mode,
        }
    }

    /// Force sequential mode even if storage supports transactions.
    pub fn sequential(storage: Arc<dyn Storage>, recorder: AuditRecorder) -> Self {
        Self {
            storage,
            recorder,
            mode: ConsistencyMode::Sequential,
        }
    }

    pub fn mode(&self) -> ConsistencyMode {
        self.mode
    }

    pub fn recorder(&self) -> &AuditRecorder {
        &self.recorder
    }

    pub async fn apply(
        &self,
        actor: PrincipalId,
        mutation: &Mutation,
        now: DateTime<Utc>,
    ) -> Result<AuditEntry, AuditError> {
        match self.mode {
            ConsistencyMode::Transactional => {
                let draft = AuditDraft::new(actor, mutation.action, mutation.target.clone(), now);
                let entry = self
                    .storage
                    .execute_audited(mutation, draft, self.recorder.store().as_ref())
                    .await?;
                tracing::info!(
                    entry_id = %entry.id(),
                    actor = %actor,
                    action = %entry.action(),
                    target = %entry.target(),
                    "change applied and recorded"
                );
                Ok(entry)
            }
            ConsistencyMode::Sequential => {
                let outcome = self.storage.execute(mutation).await?;
                self.recorder
                    .record(actor, mutation.action, mutation.target.clone(), outcome.before, outcome.after, now)
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            actor = %actor,
                            action = %mutation.action,
                            target = %mutation.target,
                            error = %e,
                            "mutation applied but audit write failed"
                        );
                        AuditError::AuditWriteFailed {
                            target: mutation.target.clone(),
                            reason: e.to_string(),
                        }
                    })
            }
        }
    }
}

impl core::fmt::Debug for AuditedExecutor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuditedExecutor")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActionKind, InMemoryAuditStore, InMemoryStorage};
    use dcim_core::{DomainError, EntityKind, TargetRef};
    use serde_json::json;

    fn device() -> TargetRef {
        TargetRef::device("42")
    }

    async fn seeded(storage: InMemoryStorage) -> Arc<InMemoryStorage> {
        storage.seed(device(), json!({"name": "sw1", "status": "active"})).await;
        Arc::new(storage)
    }

    #[tokio::test]
    async fn picks_mode_from_storage_capabilities() {
        let audit = AuditRecorder::new(InMemoryAuditStore::arc());

        let tx = AuditedExecutor::new(Arc::new(InMemoryStorage::new()), audit.clone());
        let seq = AuditedExecutor::new(Arc::new(InMemoryStorage::non_transactional()), audit);

        assert_eq!(tx.mode(), ConsistencyMode::Transactional);
        assert_eq!(seq.mode(), ConsistencyMode::Sequential);
    }

    #[tokio::test]
    async fn transactional_update_produces_exactly_one_entry() {
        let storage = seeded(InMemoryStorage::new()).await;
        let audit_store = InMemoryAuditStore::arc();
        let executor = AuditedExecutor::new(storage.clone(), AuditRecorder::new(audit_store.clone()));
        let bob = PrincipalId::new();

        let entry = executor
            .apply(bob, &Mutation::update(device(), json!({"status": "retired"})), Utc::now())
            .await
            .unwrap();

        assert_eq!(entry.actor(), bob);
        assert_eq!(entry.action(), ActionKind::Update);
        assert_eq!(entry.before().unwrap()["status"], "active");
        assert_eq!(entry.after().unwrap()["status"], "retired");
        assert_eq!(audit_store.entries(), vec![entry]);
        assert_eq!(storage.get(&device()).await.unwrap()["status"], "retired");
    }

    #[tokio::test]
    async fn transactional_audit_failure_leaves_nothing_behind() {
        let storage = seeded(InMemoryStorage::new()).await;
        let audit_store = InMemoryAuditStore::arc();
        audit_store.fail_appends(true);
        let executor = AuditedExecutor::new(storage.clone(), AuditRecorder::new(audit_store.clone()));

        let result = executor
            .apply(PrincipalId::new(), &Mutation::update(device(), json!({"status": "retired"})), Utc::now())
            .await;

        assert!(matches!(result, Err(AuditError::Storage(_))));
        assert_eq!(storage.get(&device()).await.unwrap()["status"], "active");
        assert!(audit_store.entries().is_empty());
    }

    #[tokio::test]
    async fn sequential_update_records_through_the_audit_store() {
        let storage = seeded(InMemoryStorage::non_transactional()).await;
        let audit_store = InMemoryAuditStore::arc();
        let executor = AuditedExecutor::new(storage.clone(), AuditRecorder::new(audit_store.clone()));

        let entry = executor
            .apply(PrincipalId::new(), &Mutation::update(device(), json!({"status": "retired"})), Utc::now())
            .await
            .unwrap();

        assert_eq!(audit_store.for_target(&device()), vec![entry]);
    }

    #[tokio::test]
    async fn sequential_audit_failure_fails_the_call_after_applying() {
        let storage = seeded(InMemoryStorage::non_transactional()).await;
        let audit_store = InMemoryAuditStore::arc();
        audit_store.fail_appends(true);
        let executor = AuditedExecutor::new(storage.clone(), AuditRecorder::new(audit_store.clone()));

        let result = executor
            .apply(PrincipalId::new(), &Mutation::update(device(), json!({"status": "retired"})), Utc::now())
            .await;

        assert!(matches!(result, Err(AuditError::AuditWriteFailed { ref target, .. }) if *target == device()));
        // The inconsistency window: applied, unrecorded, surfaced as an error.
        assert_eq!(storage.get(&device()).await.unwrap()["status"], "retired");
        assert!(audit_store.entries().is_empty());
    }

    #[tokio::test]
    async fn both_modes_and_direct_records_share_one_log() {
        let audit_store = InMemoryAuditStore::arc();
        let recorder = AuditRecorder::new(audit_store.clone());
        let tx = AuditedExecutor::new(seeded(InMemoryStorage::new()).await, recorder.clone());
        let seq = AuditedExecutor::new(seeded(InMemoryStorage::non_transactional()).await, recorder.clone());
        let actor = PrincipalId::new();

        let first = tx
            .apply(actor, &Mutation::update(device(), json!({"status": "retired"})), Utc::now())
            .await
            .unwrap();
        let second = seq.apply(actor, &Mutation::delete(device()), Utc::now()).await.unwrap();
        let third = recorder
            .record(
                actor,
                ActionKind::Create,
                TargetRef::new(EntityKind::Rack, "r1"),
                None,
                Some(json!({"name": "r1"})),
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(audit_store.entries(), vec![first, second, third]);
    }

    #[tokio::test]
    async fn failed_mutation_never_produces_an_entry() {
        for storage in [InMemoryStorage::new(), InMemoryStorage::non_transactional()] {
            let storage = Arc::new(storage);
            let audit_store = InMemoryAuditStore::arc();
            let executor = AuditedExecutor::new(storage.clone(), AuditRecorder::new(audit_store.clone()));

            let result = executor
                .apply(PrincipalId::new(), &Mutation::delete(TargetRef::device("missing")), Utc::now())
                .await;

            assert!(matches!(result, Err(AuditError::Mutation(DomainError::NotFound(_)))));
            assert!(audit_store.entries().is_empty());
        }
    }
}
