use chrono::{DateTime, Utc};
use dcim_auth::PrincipalId;
use dcim_core::TargetRef;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{AuditError, MutationOutcome};

/// Audit entry identifier (UUIDv7, time-ordered).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditEntryId(Uuid);

impl AuditEntryId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of change being recorded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
        }
    }
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable change-log record.
///
/// Snapshot shape by action:
/// - `create`: `after` only
/// - `update`: both
/// - `delete`: `before` only
///
/// Fields are private and there is no mutation API; an entry is exactly what
/// was validated at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    id: AuditEntryId,
    actor: PrincipalId,
    action: ActionKind,
    target: TargetRef,
    recorded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<JsonValue>,
}

impl AuditEntry {
    pub fn new(
        actor: PrincipalId,
        action: ActionKind,
        target: TargetRef,
        recorded_at: DateTime<Utc>,
        before: Option<JsonValue>,
        after: Option<JsonValue>,
    ) -> Result<Self, AuditError> {
        match (action, before.is_some(), after.is_some()) {
            (ActionKind::Create, false, true)
            | (ActionKind::Update, true, true)
            | (ActionKind::Delete, true, false) => {}
            (ActionKind::Create, _, _) => {
                return Err(AuditError::invalid_snapshot(
                    "create requires an after snapshot and no before snapshot",
                ));
            }
            (ActionKind::Update, _, _) => {
                return Err(AuditError::invalid_snapshot(
                    "update requires both before and after snapshots",
                ));
            }
            (ActionKind::Delete, _, _) => {
                return Err(AuditError::invalid_snapshot(
                    "delete requires a before snapshot and no after snapshot",
                ));
            }
        }

        Ok(Self {
            id: AuditEntryId::new(),
            actor,
            action,
            target,
            recorded_at,
            before,
            after,
        })
    }

    pub fn id(&self) -> AuditEntryId {
        self.id
    }

    pub fn actor(&self) -> PrincipalId {
        self.actor
    }

    pub fn action(&self) -> ActionKind {
        self.action
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn before(&self) -> Option<&JsonValue> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&JsonValue> {
        self.after.as_ref()
    }
}

/// Everything about an entry except the snapshots, which only storage can
/// observe while applying the mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditDraft {
    pub actor: PrincipalId,
    pub action: ActionKind,
    pub target: TargetRef,
    pub recorded_at: DateTime<Utc>,
}

impl AuditDraft {
    pub fn new(actor: PrincipalId, action: ActionKind, target: TargetRef, recorded_at: DateTime<Utc>) -> Self {
        Self {
            actor,
            action,
            target,
            recorded_at,
        }
    }

    pub fn complete(self, outcome: &MutationOutcome) -> Result<AuditEntry, AuditError> {
        AuditEntry::new(
            self.actor,
            self.action,
            self.target,
            self.recorded_at,
            outcome.before.clone(),
            outcome.after.clone(),
        )
    }
}
