use std::sync::Arc;

use chrono::{DateTime, Utc};
use dcim_auth::PrincipalId;
use dcim_core::TargetRef;
use serde_json::Value as JsonValue;

use crate::{ActionKind, AuditEntry, AuditError, AuditStore};

/// Validates and appends change-log entries.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// The log every entry ends up in, whichever path produced it.
    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Build an entry, append it and return it.
    ///
    /// An invalid snapshot shape is rejected before the store is touched.
    pub async fn record(
        &self,
        actor: PrincipalId,
        action: ActionKind,
        target: TargetRef,
        before: Option<JsonValue>,
        after: Option<JsonValue>,
        now: DateTime<Utc>,
    ) -> Result<AuditEntry, AuditError> {
        let entry = AuditEntry::new(actor, action, target, now, before, after)?;
        self.store.append(&entry).await?;

        tracing::info!(
            entry_id = %entry.id(),
            actor = %actor,
            action = %entry.action(),
            target = %entry.target(),
            "change recorded"
        );
        Ok(entry)
    }
}

impl core::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryAuditStore;
    use serde_json::json;

    #[tokio::test]
    async fn record_appends_exactly_one_entry() {
        let store = InMemoryAuditStore::arc();
        let recorder = AuditRecorder::new(store.clone());
        let target = TargetRef::device("42");

        let entry = recorder
            .record(
                PrincipalId::new(),
                ActionKind::Update,
                target.clone(),
                Some(json!({"status": "active"})),
                Some(json!({"status": "retired"})),
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(store.entries(), vec![entry]);
        assert_eq!(store.for_target(&target).len(), 1);
        assert!(store.for_target(&TargetRef::device("43")).is_empty());
    }

    #[tokio::test]
    async fn invalid_shape_never_reaches_the_store() {
        let store = InMemoryAuditStore::arc();
        let recorder = AuditRecorder::new(store.clone());

        let result = recorder
            .record(PrincipalId::new(), ActionKind::Create, TargetRef::device("1"), None, None, Utc::now())
            .await;

        assert!(matches!(result, Err(AuditError::InvalidSnapshot(_))));
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_a_storage_error() {
        let store = InMemoryAuditStore::arc();
        store.fail_appends(true);
        let recorder = AuditRecorder::new(store.clone());

        let result = recorder
            .record(
                PrincipalId::new(),
                ActionKind::Delete,
                TargetRef::device("1"),
                Some(json!({})),
                None,
                Utc::now(),
            )
            .await;

        assert!(matches!(result, Err(AuditError::Storage(_))));
    }
}
